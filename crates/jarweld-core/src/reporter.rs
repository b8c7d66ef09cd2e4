//! Reporter trait for dependency injection
//!
//! Lets the merge pipeline report stage progress without being coupled to a
//! particular console implementation. Structured logs go through `tracing`
//! regardless; a reporter is for the human-facing summary.

use jarweld_schema::Namespace;

/// Human-facing progress sink for the merge pipeline.
pub trait Reporter: Send + Sync {
    /// A pipeline stage has started (e.g. "Relocating classes").
    fn stage(&self, title: &str);

    /// A relocation loop finished one pass that added `mappings`.
    fn pass(&self, stage: &str, pass: usize, mappings: usize);

    /// An input archive was registered.
    fn input(&self, namespace: &Namespace, entries: usize);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Display a final summary.
    fn summary(&self, entries: usize, output: &str, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn stage(&self, title: &str) {
        (**self).stage(title);
    }
    fn pass(&self, stage: &str, pass: usize, mappings: usize) {
        (**self).pass(stage, pass, mappings);
    }
    fn input(&self, namespace: &Namespace, entries: usize) {
        (**self).input(namespace, entries);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn summary(&self, entries: usize, output: &str, elapsed_secs: f64) {
        (**self).summary(entries, output, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (e.g., library use, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn stage(&self, _: &str) {}
    fn pass(&self, _: &str, _: usize, _: usize) {}
    fn input(&self, _: &Namespace, _: usize) {}
    fn warning(&self, _: &str) {}
    fn summary(&self, _: usize, _: &str, _: f64) {}
}
