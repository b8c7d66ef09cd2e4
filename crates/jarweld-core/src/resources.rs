//! Resource relocation.
//!
//! After class relocation, text resources still name classes and files by
//! their old paths, and conflicting plain files still sit at the same path in
//! several archives. This stage renames conflicting plain files to
//! `dir/<namespace>-<file>` and rewrites every textual reference to a
//! relocated entry, looping until a pass changes nothing.

use jarweld_schema::EntryKind;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::archive::{Archive, ArchiveEntry, Compression};
use crate::detect::{VariantPolicy, detect};
use crate::error::{MergeError, Result};
use crate::mapping::RelocationMap;
use crate::namespaced::NamespacedArchive;
use crate::reporter::Reporter;
use crate::rewrite::Substitutions;

/// Substitutions and file renames derived from one archive's mappings.
#[derive(Debug, Default)]
pub struct ResourcePlan {
    /// Text rewrites for every mapped entry.
    pub substitutions: Substitutions,
    /// `(original, target)` for plain files that move.
    pub renames: Vec<(String, String)>,
}

impl ResourcePlan {
    /// Derive the plan for one archive's `map`.
    ///
    /// The manifest is never relocated by name, so its key is skipped.
    pub fn new(map: &RelocationMap) -> Self {
        let mut plan = Self::default();
        for (original, relocated) in map.iter() {
            match EntryKind::of(original) {
                EntryKind::Manifest => {}
                EntryKind::Class => plan.substitutions.insert_class(original, relocated),
                EntryKind::Service => plan.substitutions.insert_path_forms(original, relocated),
                EntryKind::Resource => {
                    plan.substitutions.insert_path_forms(original, relocated);
                    plan.renames.push((original.to_string(), relocated.to_string()));
                }
            }
        }
        plan
    }

    /// Whether applying the plan cannot change anything.
    pub fn is_empty(&self) -> bool {
        self.substitutions.is_empty() && self.renames.is_empty()
    }
}

/// What one pass did to one archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceChanges {
    /// Plain files moved to their namespaced name.
    pub renamed: usize,
    /// Text entries whose references were rewritten.
    pub rewritten: usize,
}

impl ResourceChanges {
    /// Whether anything changed.
    pub fn any(&self) -> bool {
        self.renamed > 0 || self.rewritten > 0
    }
}

impl std::ops::AddAssign for ResourceChanges {
    fn add_assign(&mut self, rhs: Self) {
        self.renamed += rhs.renamed;
        self.rewritten += rhs.rewritten;
    }
}

/// Apply `plan` to the archive at `archive.path()`, rewriting it only if
/// something changed.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or written.
pub fn apply_plan(archive: &NamespacedArchive, plan: &ResourcePlan) -> Result<ResourceChanges> {
    let mut changes = ResourceChanges::default();
    if plan.is_empty() {
        return Ok(changes);
    }

    let mut zip = Archive::open(archive.path())?;
    for (from, to) in &plan.renames {
        if zip.rename(from, to) {
            debug!(namespace = %archive.namespace(), from = %from, to = %to, "renamed resource");
            changes.renamed += 1;
        }
    }

    let updates: Vec<ArchiveEntry> = zip
        .files()
        .filter_map(|entry| {
            let text = entry.text()?;
            let rewritten = plan.substitutions.apply(text)?;
            Some(ArchiveEntry::file(entry.path.clone(), rewritten))
        })
        .collect();
    for entry in updates {
        debug!(namespace = %archive.namespace(), entry = %entry.path, "rewrote references");
        zip.insert(entry);
        changes.rewritten += 1;
    }

    if changes.any() {
        zip.write(Compression::Deflated)?;
    }
    Ok(changes)
}

/// Drives resource relocation to a fixed point.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRelocator {
    policy: VariantPolicy,
    max_passes: usize,
}

/// Outcome of a resource relocation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceRelocation {
    /// Passes that changed at least one archive.
    pub passes: usize,
    /// Totals across all passes.
    pub changes: ResourceChanges,
}

impl Default for ResourceRelocator {
    fn default() -> Self {
        Self {
            policy: VariantPolicy::default(),
            max_passes: crate::config::DEFAULT_MAX_PASSES,
        }
    }
}

impl ResourceRelocator {
    /// Relocator with the default policy and pass limit.
    pub fn new() -> Self {
        Self::default()
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

    /// Run passes until no archive is renamed into or rewritten.
    ///
    /// The first pass applies the mappings left by class relocation; every
    /// later pass rescans for conflicts first.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::PassLimitExceeded`] if the archives keep
    /// changing past the pass limit, or the first scan or archive error.
    pub fn run(
        &self,
        archives: &mut [NamespacedArchive],
        reporter: &dyn Reporter,
    ) -> Result<ResourceRelocation> {
        let mut outcome = ResourceRelocation::default();

        loop {
            if outcome.passes > 0 {
                detect(archives, self.policy)?;
            }

            let changes: Vec<ResourceChanges> = archives
                .par_iter()
                .map(|archive| {
                    let plan = ResourcePlan::new(archive.mappings());
                    apply_plan(archive, &plan)
                })
                .collect::<Result<_>>()?;

            let mut pass = ResourceChanges::default();
            for change in changes {
                pass += change;
            }
            if !pass.any() {
                info!(
                    passes = outcome.passes,
                    renamed = outcome.changes.renamed,
                    rewritten = outcome.changes.rewritten,
                    "resource relocation reached a fixed point"
                );
                return Ok(outcome);
            }
            if outcome.passes == self.max_passes {
                return Err(MergeError::PassLimitExceeded {
                    stage: "resource",
                    passes: self.max_passes,
                });
            }

            outcome.passes += 1;
            outcome.changes += pass;
            info!(
                pass = outcome.passes,
                renamed = pass.renamed,
                rewritten = pass.rewritten,
                "relocated resources"
            );
            reporter.pass("resources", outcome.passes, pass.renamed + pass.rewritten);
        }
    }
}
