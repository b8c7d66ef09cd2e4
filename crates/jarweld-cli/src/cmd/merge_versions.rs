//! Merge-versions command

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use jarweld_core::Reporter;
use jarweld_core::archive::{self, Archive};
use jarweld_core::multiversion::{self, VersionInput};
use jarweld_core::version_range;

use crate::split_labelled;
use crate::ui::ConsoleReporter;

/// Bundle `RANGE=ARCHIVE` inputs into one multiversion archive at `output`.
pub fn merge_versions(inputs: &[String], output: &Path, quiet: bool) -> Result<()> {
    let started = Instant::now();
    let reporter = ConsoleReporter::new(quiet);

    reporter.stage("Reading version ranges");
    let mut versions = Vec::with_capacity(inputs.len());
    for arg in inputs {
        let (range, path) = split_labelled(arg);
        if !path.is_file() {
            bail!("Archive not found: {}", path.display());
        }
        let range = match range {
            Some(range) => range.to_string(),
            None => {
                let archive = Archive::open(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                version_range::detect(&archive)
            }
        };
        reporter.field(&range, &path.display().to_string());
        versions.push(VersionInput::new(range, path));
    }

    reporter.stage("Bundling");
    let report = multiversion::bundle(&versions, output)
        .with_context(|| format!("Failed to bundle into {}", output.display()))?;
    reporter.field("common", &format!("{} shared files", report.common));

    let entries = archive::verify(output)?;
    reporter.summary(
        entries,
        &output.display().to_string(),
        started.elapsed().as_secs_f64(),
    );
    Ok(())
}
