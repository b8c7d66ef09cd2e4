//! An input archive registered for merging under a namespace.

use std::path::{Path, PathBuf};

use jarweld_schema::Namespace;

use crate::mapping::{MappingTable, RelocationMap};

/// Working copy of one input plus its relocation state.
///
/// Owned by exactly one worker per pass: the scan reads the archive, the
/// apply step rewrites it, and only this value's owner appends to its
/// mapping table.
#[derive(Debug)]
pub struct NamespacedArchive {
    namespace: Namespace,
    path: PathBuf,
    mappings: RelocationMap,
    table: Option<MappingTable>,
}

impl NamespacedArchive {
    /// Register the working copy at `path` under `namespace`, with no mappings.
    pub fn new(namespace: Namespace, path: impl Into<PathBuf>) -> Self {
        Self {
            namespace,
            path: path.into(),
            mappings: RelocationMap::new(),
            table: None,
        }
    }

    /// Tag this archive relocates under.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Path of the working copy; replaced atomically by each rewrite.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mappings recorded so far.
    pub fn mappings(&self) -> &RelocationMap {
        &self.mappings
    }

    /// Mutable access for the conflict detector.
    pub fn mappings_mut(&mut self) -> &mut RelocationMap {
        &mut self.mappings
    }

    /// The tiny table, once a class row has been written.
    pub fn table(&self) -> Option<&MappingTable> {
        self.table.as_ref()
    }

    /// Append this archive's unwritten class mappings to its table, creating
    /// `<dir>/<namespace>.tiny` on first use.
    ///
    /// Returns the number of rows appended.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the table cannot be created or written.
    pub fn append_class_rows(&mut self, dir: &Path) -> crate::Result<usize> {
        let table = match self.table.take() {
            Some(table) => table,
            None => MappingTable::create(dir, &self.namespace)?,
        };
        self.table.insert(table).append(&self.mappings)
    }
}
