//! Archive combiner.
//!
//! Unions the relocated archives into one. Entries are taken in registration
//! order and the first occurrence of a path wins; by this point any path that
//! differed between inputs has been relocated, so a remaining collision is
//! byte-identical or a directory marker. Manifests and service descriptors
//! are merged instead of picked.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use jarweld_schema::{EntryKind, MANIFEST_PATH};
use tracing::{debug, info};

use crate::archive::{Archive, ArchiveEntry, Compression};
use crate::error::Result;
use crate::manifest::Manifest;
use crate::namespaced::NamespacedArchive;

/// Summary of one combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombineReport {
    /// Entries written, including the manifest and service descriptors.
    pub entries: usize,
    /// Later occurrences dropped in favour of an earlier one.
    pub duplicates: usize,
    /// Manifest attributes whose value was replaced by a later input.
    pub manifest_overrides: usize,
    /// Service descriptors written.
    pub services: usize,
}

/// Ordered, de-duplicated union of service descriptor lines.
#[derive(Debug, Clone, Default)]
pub struct ServiceUnion {
    files: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl ServiceUnion {
    /// Add the providers listed in `content` under `path`. Lines are trimmed
    /// and blank lines dropped.
    pub fn add(&mut self, path: &str, content: &[u8]) {
        let slot = *self.index.entry(path.to_string()).or_insert_with(|| {
            self.files.push((path.to_string(), Vec::new()));
            self.files.len() - 1
        });
        let lines = &mut self.files[slot].1;
        for line in String::from_utf8_lossy(content).lines() {
            let line = line.trim();
            if !line.is_empty() && !lines.iter().any(|l| l == line) {
                lines.push(line.to_string());
            }
        }
    }

    /// Number of descriptor files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no descriptor was added.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// One entry per descriptor, newline-terminated lines.
    pub fn into_entries(self) -> impl Iterator<Item = ArchiveEntry> {
        self.files.into_iter().map(|(path, lines)| {
            let mut content = lines.join("\n");
            content.push('\n');
            ArchiveEntry::file(path, content)
        })
    }
}

/// Combines archives into a single output.
#[derive(Debug, Clone, Default)]
pub struct Combiner {
    extra_attributes: Vec<(String, String)>,
    compression: Compression,
}

impl Combiner {
    /// Combiner with deflate compression and no extra attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes set on the merged manifest after all inputs.
    #[must_use]
    pub fn extra_attributes<I, K, V>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.extra_attributes = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Compression of the combined archive.
    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Combine `inputs` into `dest`, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if an input cannot be read or `dest` cannot be written.
    pub fn combine(&self, inputs: &[NamespacedArchive], dest: &Path) -> Result<CombineReport> {
        let mut report = CombineReport::default();
        let mut manifest = Manifest::new();
        let mut services = ServiceUnion::default();
        let mut seen = HashSet::new();
        let mut body = Vec::new();

        for input in inputs {
            let archive = Archive::open(input.path())?;
            let origin = input.namespace().as_str();
            for entry in archive.entries() {
                if entry.is_dir {
                    if seen.insert(entry.path.clone()) {
                        body.push(entry.clone());
                    }
                    continue;
                }
                match entry.kind() {
                    EntryKind::Manifest => {
                        let parsed = Manifest::parse(&String::from_utf8_lossy(&entry.data));
                        report.manifest_overrides += manifest.merge_from(&parsed, origin);
                    }
                    EntryKind::Service => services.add(&entry.path, &entry.data),
                    EntryKind::Class | EntryKind::Resource => {
                        if seen.insert(entry.path.clone()) {
                            body.push(entry.clone());
                        } else {
                            debug!(entry = %entry.path, origin, "keeping first occurrence");
                            report.duplicates += 1;
                        }
                    }
                }
            }
        }

        for (key, value) in &self.extra_attributes {
            manifest.insert(key.as_str(), value.as_str());
        }

        report.services = services.len();
        let mut entries = Vec::with_capacity(body.len() + services.len() + 1);
        entries.push(ArchiveEntry::file(MANIFEST_PATH, manifest.to_bytes()));
        entries.extend(body);
        entries.extend(services.into_entries());
        report.entries = entries.len();

        Archive::from_entries(dest, entries).write(self.compression)?;
        info!(
            output = %dest.display(),
            entries = report.entries,
            duplicates = report.duplicates,
            services = report.services,
            "combined archives"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jarweld_schema::Namespace;
    use tempfile::TempDir;

    fn input(dir: &Path, ns: &str, files: &[(&str, &str)]) -> NamespacedArchive {
        let path = dir.join(format!("{ns}.jar"));
        let mut archive = Archive::empty(&path);
        for (name, content) in files {
            archive.insert(ArchiveEntry::file(*name, content.as_bytes().to_vec()));
        }
        archive.write(Compression::Deflated).unwrap();
        NamespacedArchive::new(Namespace::new(ns).unwrap(), path)
    }

    fn text(archive: &Archive, entry: &str) -> String {
        String::from_utf8(archive.get(entry).unwrap().data.clone()).unwrap()
    }

    #[test]
    fn manifests_and_services_are_unioned() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            input(
                dir.path(),
                "forge",
                &[
                    (MANIFEST_PATH, "Manifest-Version: 1.0\r\nA: 1\r\nB: 2\r\n"),
                    ("META-INF/services/x.Api", "x\ny\n"),
                ],
            ),
            input(
                dir.path(),
                "fabric",
                &[
                    (MANIFEST_PATH, "Manifest-Version: 1.0\r\nB: 3\r\nC: 4\r\n"),
                    ("META-INF/services/x.Api", "y\n  z  \n\n"),
                ],
            ),
        ];

        let dest = dir.path().join("out.jar");
        let report = Combiner::new().combine(&inputs, &dest).unwrap();
        assert_eq!(report.manifest_overrides, 1);
        assert_eq!(report.services, 1);

        let merged = Archive::open(&dest).unwrap();
        assert_eq!(merged.entries()[0].path, MANIFEST_PATH);
        let manifest = Manifest::parse(&text(&merged, MANIFEST_PATH));
        let attrs: Vec<_> = manifest.iter().collect();
        assert_eq!(
            attrs,
            vec![("Manifest-Version", "1.0"), ("A", "1"), ("B", "3"), ("C", "4")]
        );
        assert_eq!(text(&merged, "META-INF/services/x.Api"), "x\ny\nz\n");
    }

    #[test]
    fn first_occurrence_wins() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            input(dir.path(), "forge", &[("shared.txt", "first"), ("a.txt", "a")]),
            input(dir.path(), "fabric", &[("shared.txt", "second"), ("b.txt", "b")]),
        ];

        let dest = dir.path().join("out.jar");
        let report = Combiner::new().combine(&inputs, &dest).unwrap();
        assert_eq!(report.duplicates, 1);

        let merged = Archive::open(&dest).unwrap();
        assert_eq!(text(&merged, "shared.txt"), "first");
        assert!(merged.contains("a.txt") && merged.contains("b.txt"));
    }

    #[test]
    fn extra_attributes_are_applied_last() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![input(
            dir.path(),
            "forge",
            &[(MANIFEST_PATH, "Manifest-Version: 1.0\r\nImplementation-Title: forge\r\n")],
        )];

        let dest = dir.path().join("out.jar");
        Combiner::new()
            .extra_attributes([("Implementation-Title", "merged"), ("Created-By", "jarweld")])
            .combine(&inputs, &dest)
            .unwrap();

        let manifest = Manifest::parse(&text(&Archive::open(&dest).unwrap(), MANIFEST_PATH));
        assert_eq!(manifest.get("Implementation-Title"), Some("merged"));
        assert_eq!(manifest.get("Created-By"), Some("jarweld"));
    }
}
