//! Class relocation driver.
//!
//! Rewriting a class changes its bytes, which can expose new conflicts in the
//! classes that reference it. The driver therefore alternates detection and
//! remapping until a detection round adds no class mapping.
//!
//! # Implementation Note: pass structure
//! Each pass is scan → barrier → apply:
//! 1. every archive is hashed in parallel and the results are aggregated in
//!    registration order ([`detect`]);
//! 2. if none of the newly added originals is a `.class` file, stop;
//! 3. each archive that gained class rows appends them to its tiny table and
//!    is remapped with the cumulative table, again in parallel.
//!
//! Mappings are insert-if-absent and every conflict adds at least one, so the
//! loop is monotonic; `max_passes` bounds it anyway.

use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::archive::{self, parent_dir};
use crate::detect::{VariantPolicy, detect};
use crate::error::{MergeError, Result};
use crate::namespaced::NamespacedArchive;
use crate::remapper::Remapper;
use crate::reporter::Reporter;

/// Remap `archive` with `mappings` and atomically replace it with the result.
///
/// The remapper writes into a fresh temporary path beside `archive`; the
/// output must be a readable archive before it is renamed over the original.
/// On any failure the original is left untouched.
///
/// # Errors
///
/// Returns [`MergeError::Remap`] if the remapper fails, or an archive/I/O
/// error if its output cannot be verified or persisted.
pub fn remap_in_place<R: Remapper + ?Sized>(
    remapper: &R,
    archive: &Path,
    mappings: &Path,
) -> Result<()> {
    let output = tempfile::Builder::new()
        .prefix(".jarweld-remap-")
        .suffix(".jar")
        .tempfile_in(parent_dir(archive))?
        .into_temp_path();
    // the remapper creates its own output
    std::fs::remove_file(&output)?;

    remapper
        .remap(archive, &output, mappings)
        .map_err(|source| MergeError::Remap {
            archive: archive.to_path_buf(),
            source,
        })?;

    archive::verify(&output)?;
    output.persist(archive).map_err(io::Error::from)?;
    debug!(archive = %archive.display(), "remapped");
    Ok(())
}

/// Drives class relocation to a fixed point.
#[derive(Debug)]
pub struct ClassRelocator<'a, R: ?Sized> {
    remapper: &'a R,
    tables_dir: PathBuf,
    policy: VariantPolicy,
    max_passes: usize,
}

/// Outcome of a class relocation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassRelocation {
    /// Passes that remapped at least one archive.
    pub passes: usize,
    /// Class rows written across all tables.
    pub rows: usize,
}

impl<'a, R: Remapper + ?Sized> ClassRelocator<'a, R> {
    /// Relocator writing tiny tables under `tables_dir`.
    pub fn new(remapper: &'a R, tables_dir: impl Into<PathBuf>) -> Self {
        Self {
            remapper,
            tables_dir: tables_dir.into(),
            policy: VariantPolicy::default(),
            max_passes: crate::config::DEFAULT_MAX_PASSES,
        }
    }

    /// Which owners of a conflicting variant are relocated.
    #[must_use]
    pub fn policy(mut self, policy: VariantPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Passes allowed before giving up.
    #[must_use]
    pub fn max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Run passes until detection adds no class mapping.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::PassLimitExceeded`] if a fixed point is not
    /// reached within the pass limit, or the first scan, table or remap error.
    pub fn run(
        &self,
        archives: &mut [NamespacedArchive],
        reporter: &dyn Reporter,
    ) -> Result<ClassRelocation> {
        let mut outcome = ClassRelocation::default();

        loop {
            let added = detect(archives, self.policy)?;
            if !added.has_classes() {
                info!(
                    passes = outcome.passes,
                    rows = outcome.rows,
                    "class relocation reached a fixed point"
                );
                return Ok(outcome);
            }
            if outcome.passes == self.max_passes {
                return Err(MergeError::PassLimitExceeded {
                    stage: "class",
                    passes: self.max_passes,
                });
            }
            outcome.passes += 1;

            let mut pending = Vec::new();
            for (index, archive) in archives.iter_mut().enumerate() {
                if !added.archive_has_classes(index) {
                    continue;
                }
                let rows = archive.append_class_rows(&self.tables_dir)?;
                outcome.rows += rows;
                debug!(namespace = %archive.namespace(), rows, "appended class rows");
                if let Some(table) = archive.table() {
                    pending.push((archive.path().to_path_buf(), table.path().to_path_buf()));
                }
            }

            info!(
                pass = outcome.passes,
                archives = pending.len(),
                mappings = added.total(),
                "remapping classes"
            );
            reporter.pass("classes", outcome.passes, added.total());

            pending
                .par_iter()
                .try_for_each(|(archive, table)| remap_in_place(self.remapper, archive, table))?;
        }
    }
}
