//! Console implementation of the pipeline reporter.

use crossterm::style::Stylize;
use jarweld_core::Reporter;
use jarweld_schema::Namespace;

use super::theme::Theme;

/// Prints pipeline progress to stdout; warnings go to stderr even when quiet.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    theme: Theme,
    quiet: bool,
}

impl ConsoleReporter {
    /// Reporter printing progress unless `quiet`.
    pub fn new(quiet: bool) -> Self {
        Self {
            theme: Theme::default(),
            quiet,
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// A `label  value` line, indented like the rest of a stage.
    pub fn field(&self, label: &str, value: &str) {
        if self.quiet {
            return;
        }
        let lw = self.theme.label_width;
        println!("  {:<lw$}{value}", label.with(self.theme.colors.label));
    }

    pub fn success(&self, msg: &str) {
        if self.quiet {
            return;
        }
        println!(
            "{} {}",
            self.theme.icons.success.with(self.theme.colors.success),
            msg.with(self.theme.colors.success)
        );
    }
}

impl Reporter for ConsoleReporter {
    fn stage(&self, title: &str) {
        if self.quiet {
            return;
        }
        println!();
        println!("{}", title.dark_grey());
    }

    fn pass(&self, stage: &str, pass: usize, mappings: usize) {
        if self.quiet {
            return;
        }
        println!(
            "  {} {stage} pass {pass}  {}",
            self.theme.icons.active.with(self.theme.colors.secondary),
            format!("{mappings} changed").with(self.theme.colors.secondary)
        );
    }

    fn input(&self, namespace: &Namespace, entries: usize) {
        self.field(namespace.as_str(), &format!("{entries} entries"));
    }

    fn warning(&self, msg: &str) {
        eprintln!(
            "{} {}",
            self.theme.icons.warning.with(self.theme.colors.warning),
            msg.with(self.theme.colors.warning)
        );
    }

    fn summary(&self, entries: usize, output: &str, elapsed_secs: f64) {
        if self.quiet {
            return;
        }
        println!();
        let plural = if entries == 1 { "y" } else { "ies" };
        self.success(&format!(
            "{entries} entr{plural} written to {output} in {elapsed_secs:.1}s"
        ));
    }
}
