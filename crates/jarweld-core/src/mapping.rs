//! Relocation maps and the persisted tiny mapping table.
//!
//! A [`RelocationMap`] records `original → relocated` paths for one archive.
//! Entries are insert-if-absent: once a path is mapped during a merge it is
//! never re-targeted, which is what makes the relocation loops monotonic.
//!
//! The class-file subset of each map is persisted as a tiny v2 table, the
//! format consumed by the bytecode remapper (columns are tab-separated):
//!
//! ```text
//! tiny    2    0    original    relocated
//! c    com/x/Util    forge/com/x/Util
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use jarweld_schema::{CLASS_SUFFIX, EntryKind, Namespace, TINY_HEADER, strip_class_suffix};
use tracing::debug;

use crate::error::Result;

/// Ordered `original → relocated` paths of one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationMap {
    entries: BTreeMap<String, String>,
}

impl RelocationMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping unless `original` is already mapped.
    ///
    /// Returns `true` if the mapping was added.
    pub fn insert_if_absent(&mut self, original: &str, relocated: String) -> bool {
        if self.entries.contains_key(original) {
            return false;
        }
        self.entries.insert(original.to_string(), relocated);
        true
    }

    /// Relocated path of `original`, if mapped.
    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    /// Whether `original` is mapped.
    pub fn contains(&self, original: &str) -> bool {
        self.entries.contains_key(original)
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(original, relocated)` pairs ordered by original path.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Mappings whose original is a class file.
    pub fn classes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| k.ends_with(CLASS_SUFFIX))
    }
}

/// Class-convention relocation: `<namespace>/<path>`.
pub fn relocated_path(namespace: &Namespace, path: &str) -> String {
    format!("{namespace}/{path}")
}

/// Resource-convention relocation: the namespace prefixes the file name only,
/// so `assets/x/lang/en_us.json` becomes `assets/x/lang/<namespace>-en_us.json`.
pub fn relocated_resource_path(namespace: &Namespace, path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/{namespace}-{file}"),
        None => format!("{namespace}-{path}"),
    }
}

/// Destination recorded for a conflicting `path`: plain resources follow the
/// resource convention, everything else the class convention.
pub fn relocation_target(namespace: &Namespace, path: &str) -> String {
    match EntryKind::of(path) {
        EntryKind::Resource => relocated_resource_path(namespace, path),
        EntryKind::Class | EntryKind::Manifest | EntryKind::Service => {
            relocated_path(namespace, path)
        }
    }
}

/// Append-only tiny table on disk, one per namespaced archive.
#[derive(Debug)]
pub struct MappingTable {
    path: PathBuf,
    written: BTreeSet<String>,
}

impl MappingTable {
    /// Create `<dir>/<namespace>.tiny` containing only the header line.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be created.
    pub fn create(dir: &Path, namespace: &Namespace) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{namespace}.tiny"));
        let mut file = File::create(&path)?;
        writeln!(file, "{TINY_HEADER}")?;
        debug!(table = %path.display(), "created mapping table");
        Ok(Self {
            path,
            written: BTreeSet::new(),
        })
    }

    /// Location of the table file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of class rows written so far.
    pub fn rows(&self) -> usize {
        self.written.len()
    }

    /// Append rows for every class mapping of `map` not written before.
    ///
    /// Returns the number of rows appended.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the table cannot be opened or written.
    pub fn append(&mut self, map: &RelocationMap) -> Result<usize> {
        let pending: Vec<(&str, &str)> = map
            .classes()
            .filter(|(original, _)| !self.written.contains(*original))
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut out = BufWriter::new(file);
        for (original, relocated) in &pending {
            write_row(&mut out, original, relocated)?;
        }
        out.flush()?;

        self.written
            .extend(pending.iter().map(|(original, _)| (*original).to_string()));
        Ok(pending.len())
    }
}

/// Write a standalone table with the given class rows (paths with `.class`).
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn write_table<'a>(
    path: &Path,
    rows: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{TINY_HEADER}")?;
    for (original, relocated) in rows {
        write_row(&mut out, original, relocated)?;
    }
    out.flush()?;
    Ok(())
}

fn write_row(out: &mut impl Write, original: &str, relocated: &str) -> std::io::Result<()> {
    writeln!(
        out,
        "c\t{}\t{}",
        strip_class_suffix(original),
        strip_class_suffix(relocated)
    )
}
