//! Conflict detection across namespaced archives.
//!
//! Every non-directory entry of every archive is hashed. Entries are grouped
//! by path; a path whose group holds two or more distinct content hashes is a
//! conflict, and the owners of those variants receive a namespaced mapping.
//!
//! Scanning is parallel per archive and produces owned results; grouping
//! happens afterwards in registration order, so "first seen" always means
//! "earliest registered archive" regardless of thread scheduling.

use std::collections::BTreeMap;
use std::path::Path;

use jarweld_schema::{CLASS_SUFFIX, ContentHash};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::Archive;
use crate::error::Result;
use crate::mapping::relocation_target;
use crate::namespaced::NamespacedArchive;

/// Which owners of a conflicting path get relocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantPolicy {
    /// Only the first archive seen with each distinct hash is relocated. A
    /// later archive whose content matches an already-recorded variant keeps
    /// its entry at the original path.
    #[default]
    FirstSeen,
    /// Every archive owning any variant of a conflicting path is relocated.
    AllOwners,
}

/// One distinct content variant of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Digest shared by every owner.
    pub hash: ContentHash,
    /// Indices of archives holding this content, in registration order.
    pub owners: Vec<usize>,
}

/// All content variants observed for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictGroup {
    /// Entry path.
    pub path: String,
    /// Distinct contents, in order of first appearance.
    pub variants: Vec<Variant>,
}

impl ConflictGroup {
    /// Whether the path has two or more contents.
    pub fn is_conflict(&self) -> bool {
        self.variants.len() >= 2
    }

    /// Archives that must relocate this path under `policy`.
    pub fn owners_to_relocate(&self, policy: VariantPolicy) -> Vec<usize> {
        match policy {
            VariantPolicy::FirstSeen => self.variants.iter().map(|v| v.owners[0]).collect(),
            VariantPolicy::AllOwners => {
                let mut owners: Vec<usize> = self
                    .variants
                    .iter()
                    .flat_map(|v| v.owners.iter().copied())
                    .collect();
                owners.sort_unstable();
                owners
            }
        }
    }
}

/// Result of one scan over a set of archives.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    groups: BTreeMap<String, ConflictGroup>,
}

impl ScanReport {
    /// Groups holding two or more variants, ordered by path.
    pub fn conflicts(&self) -> impl Iterator<Item = &ConflictGroup> {
        self.groups.values().filter(|g| g.is_conflict())
    }

    /// Group for `path`, conflicting or not.
    pub fn group(&self, path: &str) -> Option<&ConflictGroup> {
        self.groups.get(path)
    }

    /// Number of distinct paths seen.
    pub fn paths(&self) -> usize {
        self.groups.len()
    }

    fn record(&mut self, owner: usize, path: String, hash: ContentHash) {
        let group = self
            .groups
            .entry(path)
            .or_insert_with_key(|path| ConflictGroup {
                path: path.clone(),
                variants: Vec::new(),
            });
        match group.variants.iter_mut().find(|v| v.hash == hash) {
            Some(variant) => variant.owners.push(owner),
            None => group.variants.push(Variant {
                hash,
                owners: vec![owner],
            }),
        }
    }
}

/// Hash every file of every archive and group the results by path.
///
/// # Errors
///
/// Returns the first error encountered opening any archive.
pub fn scan<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<ScanReport> {
    let per_archive: Vec<Vec<(String, ContentHash)>> = paths
        .par_iter()
        .map(|path| {
            let archive = Archive::open(path.as_ref())?;
            Ok(archive
                .files()
                .map(|entry| (entry.path.clone(), entry.hash))
                .collect())
        })
        .collect::<Result<_>>()?;

    let mut report = ScanReport::default();
    for (owner, entries) in per_archive.into_iter().enumerate() {
        for (path, hash) in entries {
            report.record(owner, path, hash);
        }
    }
    Ok(report)
}

/// Originals newly mapped by one detection round, per archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMappings {
    per_archive: Vec<Vec<String>>,
}

impl NewMappings {
    /// Originals added to archive `index` in this round.
    pub fn for_archive(&self, index: usize) -> &[String] {
        self.per_archive.get(index).map_or(&[], Vec::as_slice)
    }

    /// Originals added across all archives.
    pub fn total(&self) -> usize {
        self.per_archive.iter().map(Vec::len).sum()
    }

    /// Whether the round added nothing.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Whether any new original is a class file.
    pub fn has_classes(&self) -> bool {
        self.per_archive
            .iter()
            .flatten()
            .any(|path| path.ends_with(CLASS_SUFFIX))
    }

    /// Whether archive `index` gained a class mapping.
    pub fn archive_has_classes(&self, index: usize) -> bool {
        self.for_archive(index)
            .iter()
            .any(|path| path.ends_with(CLASS_SUFFIX))
    }
}

/// Record relocation mappings for every conflict in `report`.
///
/// Each selected owner gets `original → <destination>` (see
/// [`relocation_target`]) unless the original is already mapped.
pub fn assign(
    report: &ScanReport,
    archives: &mut [NamespacedArchive],
    policy: VariantPolicy,
) -> NewMappings {
    let mut added = NewMappings {
        per_archive: vec![Vec::new(); archives.len()],
    };

    for group in report.conflicts() {
        for owner in group.owners_to_relocate(policy) {
            let archive = &mut archives[owner];
            let relocated = relocation_target(archive.namespace(), &group.path);
            if archive
                .mappings_mut()
                .insert_if_absent(&group.path, relocated)
            {
                debug!(
                    namespace = %archive.namespace(),
                    path = %group.path,
                    variants = group.variants.len(),
                    "mapped conflicting entry"
                );
                added.per_archive[owner].push(group.path.clone());
            }
        }
    }

    added
}

/// Scan `archives` and record mappings for every conflict found.
///
/// # Errors
///
/// Returns an error if any archive cannot be read.
pub fn detect(archives: &mut [NamespacedArchive], policy: VariantPolicy) -> Result<NewMappings> {
    let paths: Vec<&Path> = archives.iter().map(NamespacedArchive::path).collect();
    let report = scan(&paths)?;
    Ok(assign(&report, archives, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveEntry, Compression};
    use jarweld_schema::Namespace;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn jar(dir: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(name);
        let mut archive = Archive::empty(&path);
        for (entry, content) in files {
            archive.insert(ArchiveEntry::file(*entry, content.as_bytes().to_vec()));
        }
        archive.write(Compression::Deflated).unwrap();
        path
    }

    fn registered(dir: &Path, inputs: &[(&str, &[(&str, &str)])]) -> Vec<NamespacedArchive> {
        inputs
            .iter()
            .map(|(ns, files)| {
                let path = jar(dir, &format!("{ns}.jar"), files);
                NamespacedArchive::new(Namespace::new(*ns).unwrap(), path)
            })
            .collect()
    }

    #[test]
    fn identical_entries_are_not_conflicts() {
        let dir = TempDir::new().unwrap();
        let mut archives = registered(
            dir.path(),
            &[
                ("forge", &[("a/Same.class", "x")]),
                ("fabric", &[("a/Same.class", "x")]),
            ],
        );
        let added = detect(&mut archives, VariantPolicy::FirstSeen).unwrap();
        assert!(added.is_empty());
        assert!(archives.iter().all(|a| a.mappings().is_empty()));
    }

    #[test]
    fn differing_entries_map_every_variant_owner() {
        let dir = TempDir::new().unwrap();
        let mut archives = registered(
            dir.path(),
            &[
                ("forge", &[("a/B.class", "forge"), ("data.json", "1")]),
                ("fabric", &[("a/B.class", "fabric"), ("data.json", "1")]),
            ],
        );
        let added = detect(&mut archives, VariantPolicy::FirstSeen).unwrap();

        assert!(added.has_classes());
        assert_eq!(added.total(), 2);
        assert_eq!(archives[0].mappings().get("a/B.class"), Some("forge/a/B.class"));
        assert_eq!(archives[1].mappings().get("a/B.class"), Some("fabric/a/B.class"));
        assert!(!archives[0].mappings().contains("data.json"));
    }

    #[test]
    fn resource_mappings_record_the_renamed_file() {
        let dir = TempDir::new().unwrap();
        let mut archives = registered(
            dir.path(),
            &[
                ("forge", &[("data/cfg.json", "1")]),
                ("fabric", &[("data/cfg.json", "2")]),
            ],
        );
        detect(&mut archives, VariantPolicy::FirstSeen).unwrap();
        assert_eq!(archives[0].mappings().get("data/cfg.json"), Some("data/forge-cfg.json"));
        assert_eq!(archives[1].mappings().get("data/cfg.json"), Some("data/fabric-cfg.json"));
    }

    #[test]
    fn first_seen_leaves_repeated_variant_unmapped() {
        let dir = TempDir::new().unwrap();
        let mut archives = registered(
            dir.path(),
            &[
                ("forge", &[("a/B.class", "x")]),
                ("fabric", &[("a/B.class", "y")]),
                ("quilt", &[("a/B.class", "x")]),
            ],
        );
        detect(&mut archives, VariantPolicy::FirstSeen).unwrap();
        assert!(archives[0].mappings().contains("a/B.class"));
        assert!(archives[1].mappings().contains("a/B.class"));
        assert!(!archives[2].mappings().contains("a/B.class"));
    }

    #[test]
    fn all_owners_relocates_repeated_variant() {
        let dir = TempDir::new().unwrap();
        let mut archives = registered(
            dir.path(),
            &[
                ("forge", &[("a/B.class", "x")]),
                ("fabric", &[("a/B.class", "y")]),
                ("quilt", &[("a/B.class", "x")]),
            ],
        );
        detect(&mut archives, VariantPolicy::AllOwners).unwrap();
        assert_eq!(archives[2].mappings().get("a/B.class"), Some("quilt/a/B.class"));
    }

    #[test]
    fn second_detection_adds_nothing() {
        let dir = TempDir::new().unwrap();
        let mut archives = registered(
            dir.path(),
            &[
                ("forge", &[("a/B.class", "x")]),
                ("fabric", &[("a/B.class", "y")]),
            ],
        );
        assert_eq!(detect(&mut archives, VariantPolicy::FirstSeen).unwrap().total(), 2);
        assert!(detect(&mut archives, VariantPolicy::FirstSeen).unwrap().is_empty());
    }

    #[test]
    fn scan_groups_by_path() {
        let dir = TempDir::new().unwrap();
        let a = jar(dir.path(), "a.jar", &[("x.txt", "1"), ("y.txt", "1")]);
        let b = jar(dir.path(), "b.jar", &[("x.txt", "2")]);
        let report = scan(&[a, b]).unwrap();

        assert_eq!(report.paths(), 2);
        let conflicts: Vec<_> = report.conflicts().map(|g| g.path.as_str()).collect();
        assert_eq!(conflicts, vec!["x.txt"]);
        assert_eq!(report.group("y.txt").unwrap().variants[0].owners, vec![0]);
    }
}
