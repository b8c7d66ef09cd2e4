//! Merge command

use std::path::Path;

use anyhow::{Context, Result, bail};
use jarweld_core::config::MergeConfig;
use jarweld_core::{Merger, paths};
use jarweld_schema::Namespace;
use tracing::debug;

use crate::ui::{ConsoleReporter, format_size};

/// Merge the inputs listed in `config_path`.
pub fn merge(config_path: &Path, output: Option<&Path>, quiet: bool) -> Result<()> {
    if !config_path.is_file() {
        bail!("Config file not found: {}", config_path.display());
    }
    let config = MergeConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if config.inputs.is_empty() {
        bail!("{} lists no [[input]] archives", config_path.display());
    }
    init_pool(config.jobs());

    let remapper = config
        .remapper
        .build()
        .context("Invalid [remapper] section")?;
    let mut merger = Merger::from_config(&config, remapper)?;
    if config.work_dir.is_none() {
        merger = merger.work_dir(paths::work_root().context("Failed to resolve work directory")?);
    }

    let output = output.map_or_else(|| config.output.clone(), Path::to_path_buf);
    let reporter = ConsoleReporter::new(quiet);
    let report = merger
        .run(&output, &reporter)
        .with_context(|| format!("Failed to merge into {}", output.display()))?;

    reporter.field(
        "classes",
        &format!("{} relocated in {} passes", report.classes.rows, report.classes.passes),
    );
    reporter.field(
        "resources",
        &format!(
            "{} renamed, {} rewritten",
            report.resources.changes.renamed, report.resources.changes.rewritten
        ),
    );
    if let Some(collapse) = &report.collapse {
        reporter.field(
            "collapsed",
            &format!("{} classes from {} copies", collapse.classes, collapse.pairs),
        );
    }
    if !report.skipped.is_empty() {
        let skipped: Vec<&str> = report.skipped.iter().map(Namespace::as_str).collect();
        reporter.field("skipped", &skipped.join(", "));
    }
    if let Ok(meta) = std::fs::metadata(&output) {
        reporter.field("size", &format_size(meta.len()));
    }
    Ok(())
}

/// Size the global rayon pool used for scanning and remapping.
fn init_pool(jobs: usize) {
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build_global()
    {
        debug!(error = %e, "thread pool already initialised");
    }
}
