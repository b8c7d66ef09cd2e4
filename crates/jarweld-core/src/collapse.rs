//! Duplicate collapse.
//!
//! Some classes are known to be identical across loaders apart from their
//! relocation (shared API types, for instance). Collapsing rewrites each
//! namespaced copy back to its canonical name so the merged archive carries
//! one copy and every reference points at it.
//!
//! A class name `P` covers `P.class`, nested classes `P$…` and anything
//! under `P/`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use jarweld_schema::{CLASS_SUFFIX, Namespace, strip_class_suffix};
use tracing::{debug, info};

use crate::archive::{Archive, ArchiveEntry, Compression};
use crate::error::{MergeError, Result};
use crate::mapping::write_table;
use crate::relocate::remap_in_place;
use crate::remapper::Remapper;
use crate::rewrite::Substitutions;

/// One namespaced copy to fold back onto its canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsePair {
    /// e.g. `forge/com/x/Util`
    pub source: String,
    /// e.g. `com/x/Util`
    pub destination: String,
}

/// What a collapse run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollapseReport {
    /// Namespaced copies folded back.
    pub pairs: usize,
    /// Class files moved back to a canonical name.
    pub classes: usize,
    /// Text entries whose namespaced references were rewritten.
    pub rewritten: usize,
}

/// Slash-form class prefix for a name given as `com.x.Util`, `com/x/Util` or
/// either with `.class`.
pub fn canonical_prefix(name: &str) -> String {
    strip_class_suffix(name.trim()).replace('.', "/")
}

/// Whether `path` belongs to the class named by `prefix`.
pub fn covers(prefix: &str, path: &str) -> bool {
    path.strip_prefix(prefix).is_some_and(|rest| {
        rest == CLASS_SUFFIX || rest.starts_with('/') || rest.starts_with('$')
    })
}

/// Pairs for every `(namespace, name)` whose namespaced copy is present in
/// `archive`, in name order then namespace order.
pub fn plan(archive: &Archive, namespaces: &[Namespace], names: &[String]) -> Vec<CollapsePair> {
    let mut pairs = Vec::new();
    for name in names {
        let destination = canonical_prefix(name);
        for namespace in namespaces {
            let source = format!("{namespace}/{destination}");
            if archive.files().any(|e| e.is_class() && covers(&source, &e.path)) {
                pairs.push(CollapsePair {
                    source,
                    destination: destination.clone(),
                });
            }
        }
    }
    pairs
}

/// Folds namespaced duplicates back onto their canonical names.
#[derive(Debug)]
pub struct Collapser<'a, R: ?Sized> {
    remapper: &'a R,
    tables_dir: PathBuf,
}

impl<'a, R: Remapper + ?Sized> Collapser<'a, R> {
    /// Collapser writing its one-off tables under `tables_dir`.
    pub fn new(remapper: &'a R, tables_dir: impl Into<PathBuf>) -> Self {
        Self {
            remapper,
            tables_dir: tables_dir.into(),
        }
    }

    /// Collapse every name in `names` inside the archive at `merged`.
    ///
    /// Pairs are applied one at a time. The canonical subtree is kept in a
    /// side buffer across pairs and removed from the archive before each
    /// remap, so every remap moves its source onto a free name; a later pair
    /// replaces what an earlier one (or the input) left there. The buffer is
    /// written back at the end, followed by one text pass replacing
    /// namespaced references with canonical ones.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::MissingInput`] if `merged` does not exist,
    /// [`MergeError::CollapseSourceMissing`] if a planned source disappears
    /// before its pair runs, or any remap or archive error.
    pub fn collapse(
        &self,
        merged: &Path,
        namespaces: &[Namespace],
        names: &[String],
    ) -> Result<CollapseReport> {
        if !merged.exists() {
            return Err(MergeError::MissingInput {
                name: "merged archive".to_string(),
                path: merged.to_path_buf(),
            });
        }

        let pairs = plan(&Archive::open(merged)?, namespaces, names);
        let mut report = CollapseReport {
            pairs: pairs.len(),
            ..CollapseReport::default()
        };
        if pairs.is_empty() {
            debug!(names = names.len(), "nothing to collapse");
            return Ok(report);
        }
        std::fs::create_dir_all(&self.tables_dir)?;

        let mut side: BTreeMap<String, ArchiveEntry> = BTreeMap::new();
        for pair in &pairs {
            let mut archive = Archive::open(merged)?;
            snapshot(&archive, &pair.destination, &mut side);
            if archive.remove_where(|e| covers(&pair.destination, &e.path)) > 0 {
                archive.write(Compression::Deflated)?;
            }

            let rows: Vec<(String, String)> = archive
                .files()
                .filter(|e| e.is_class() && covers(&pair.source, &e.path))
                .map(|e| {
                    let rest = &e.path[pair.source.len()..];
                    (e.path.clone(), format!("{}{rest}", pair.destination))
                })
                .collect();
            if rows.is_empty() {
                return Err(MergeError::CollapseSourceMissing {
                    source_prefix: pair.source.clone(),
                    destination: pair.destination.clone(),
                });
            }

            let table = tempfile::Builder::new()
                .prefix("collapse-")
                .suffix(".tiny")
                .tempfile_in(&self.tables_dir)?
                .into_temp_path();
            write_table(&table, rows.iter().map(|(a, b)| (a.as_str(), b.as_str())))?;
            remap_in_place(self.remapper, merged, &table)?;
            report.classes += rows.len();
            debug!(source = %pair.source, destination = %pair.destination, classes = rows.len(), "collapsed");

            snapshot(&Archive::open(merged)?, &pair.destination, &mut side);
        }

        let mut archive = Archive::open(merged)?;
        for entry in side.into_values() {
            archive.insert(entry);
        }

        let mut subs = Substitutions::new();
        for pair in &pairs {
            subs.insert_path_forms(&pair.source, &pair.destination);
        }
        let updates: Vec<ArchiveEntry> = archive
            .files()
            .filter_map(|entry| {
                let rewritten = subs.apply(entry.text()?)?;
                Some(ArchiveEntry::file(entry.path.clone(), rewritten))
            })
            .collect();
        report.rewritten = updates.len();
        for entry in updates {
            archive.insert(entry);
        }
        archive.write(Compression::Deflated)?;

        info!(
            pairs = report.pairs,
            classes = report.classes,
            rewritten = report.rewritten,
            "collapsed duplicates"
        );
        Ok(report)
    }
}

/// Copy every entry covered by `prefix` into `side`, replacing older copies.
fn snapshot(archive: &Archive, prefix: &str, side: &mut BTreeMap<String, ArchiveEntry>) {
    for entry in archive.files().filter(|e| covers(prefix, &e.path)) {
        side.insert(entry.path.clone(), entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remapper::RemapError;
    use tempfile::TempDir;

    /// Moves every class named in the table, leaving content alone.
    struct MoveRemapper;

    impl Remapper for MoveRemapper {
        fn remap(&self, input: &Path, output: &Path, mappings: &Path) -> std::result::Result<(), RemapError> {
            let other = |e: MergeError| RemapError::Other(e.to_string());
            let table = std::fs::read_to_string(mappings).map_err(|e| RemapError::Other(e.to_string()))?;
            let mut archive = Archive::open(input).map_err(other)?;
            for row in table.lines().skip(1) {
                let cols: Vec<&str> = row.split('\t').collect();
                assert!(archive.rename(&format!("{}.class", cols[1]), &format!("{}.class", cols[2])));
            }
            archive.write_to(output, Compression::Deflated).map_err(other)
        }
    }

    fn merged(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("merged.jar");
        let mut archive = Archive::empty(&path);
        for (name, content) in files {
            archive.insert(ArchiveEntry::file(*name, content.as_bytes().to_vec()));
        }
        archive.write(Compression::Deflated).unwrap();
        path
    }

    fn namespaces(tags: &[&str]) -> Vec<Namespace> {
        tags.iter().map(|t| Namespace::new(*t).unwrap()).collect()
    }

    #[test]
    fn canonical_prefix_accepts_dots_and_slashes() {
        assert_eq!(canonical_prefix("com.x.Util"), "com/x/Util");
        assert_eq!(canonical_prefix("com/x/Util.class"), "com/x/Util");
        assert_eq!(canonical_prefix(" com.x.Util.class "), "com/x/Util");
    }

    #[test]
    fn covers_class_nested_and_subtree() {
        assert!(covers("com/x/Util", "com/x/Util.class"));
        assert!(covers("com/x/Util", "com/x/Util$Inner.class"));
        assert!(covers("com/x/Util", "com/x/Util/Helper.class"));
        assert!(!covers("com/x/Util", "com/x/Utils.class"));
        assert!(!covers("com/x/Util", "forge/com/x/Util.class"));
    }

    #[test]
    fn plan_only_includes_present_namespaces() {
        let mut archive = Archive::empty("merged.jar");
        archive.insert(ArchiveEntry::file("forge/com/x/Util.class", b"a".to_vec()));
        archive.insert(ArchiveEntry::file("quilt/com/x/Util$A.class", b"b".to_vec()));

        let namespaces: Vec<Namespace> = ["forge", "fabric", "quilt"]
            .into_iter()
            .map(|n| Namespace::new(n).unwrap())
            .collect();
        let pairs = plan(&archive, &namespaces, &["com.x.Util".to_string()]);

        let sources: Vec<_> = pairs.iter().map(|p| p.source.as_str()).collect();
        assert_eq!(sources, vec!["forge/com/x/Util", "quilt/com/x/Util"]);
        assert!(pairs.iter().all(|p| p.destination == "com/x/Util"));
    }

    #[test]
    fn missing_merged_archive_aborts() {
        let dir = TempDir::new().unwrap();
        let err = Collapser::new(&MoveRemapper, dir.path().join("tables"))
            .collapse(&dir.path().join("absent.jar"), &namespaces(&["forge"]), &["com.x.Util".to_string()])
            .unwrap_err();
        assert!(matches!(err, MergeError::MissingInput { .. }));
    }

    #[test]
    fn vanished_source_aborts() {
        let dir = TempDir::new().unwrap();
        let path = merged(dir.path(), &[("forge/com/x/Util.class", "forge")]);

        // the second pair finds its source already moved by the first
        let names = vec!["com.x.Util".to_string(), "com/x/Util".to_string()];
        let err = Collapser::new(&MoveRemapper, dir.path().join("tables"))
            .collapse(&path, &namespaces(&["forge"]), &names)
            .unwrap_err();
        match err {
            MergeError::CollapseSourceMissing {
                source_prefix,
                destination,
            } => {
                assert_eq!(source_prefix, "forge/com/x/Util");
                assert_eq!(destination, "com/x/Util");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn existing_canonical_class_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = merged(
            dir.path(),
            &[
                ("com/x/Util.class", "original"),
                ("com/x/Util$Old.class", "old"),
                ("forge/com/x/Util.class", "forge"),
                ("fabric/com/x/Util.class", "fabric"),
                ("fabric/com/x/Util$Inner.class", "inner"),
                ("refs.txt", "forge.com.x.Util fabric/com/x/Util$Inner"),
            ],
        );

        let report = Collapser::new(&MoveRemapper, dir.path().join("tables"))
            .collapse(&path, &namespaces(&["forge", "fabric"]), &["com.x.Util".to_string()])
            .unwrap();
        assert_eq!(report.pairs, 2);
        assert_eq!(report.classes, 3);
        assert_eq!(report.rewritten, 1);

        let archive = Archive::open(&path).unwrap();
        let classes: Vec<&str> = archive
            .files()
            .filter(|e| e.is_class())
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(classes.len(), 3, "{classes:?}");
        assert_eq!(archive.get("com/x/Util.class").unwrap().data, b"fabric");
        assert_eq!(archive.get("com/x/Util$Inner.class").unwrap().data, b"inner");
        assert_eq!(archive.get("com/x/Util$Old.class").unwrap().data, b"old");
        assert_eq!(archive.get("refs.txt").unwrap().data, b"com.x.Util com/x/Util$Inner");
    }
}
