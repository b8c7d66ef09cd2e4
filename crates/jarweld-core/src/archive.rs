//! Archive codec adapter
//!
//! Loads a ZIP/JAR container into an in-memory snapshot of entries and writes
//! snapshots back out. Every write goes to a temporary file in the target's
//! directory which is then renamed over the target, so an archive is either
//! fully replaced or left untouched.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use jarweld_schema::{ContentHash, EntryKind, normalize_path};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{MergeError, Result};

/// A single entry snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Forward-slash path inside the archive (directories end with `/`)
    pub path: String,
    /// Raw, uncompressed bytes (empty for directories)
    pub data: Vec<u8>,
    /// Digest of `data`
    pub hash: ContentHash,
    /// Whether this is a directory marker
    pub is_dir: bool,
}

impl ArchiveEntry {
    /// Create a file entry, hashing its content.
    pub fn file(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            path: normalize_path(&path.into()),
            hash: ContentHash::compute(&data),
            data,
            is_dir: false,
        }
    }

    /// Create a directory marker.
    pub fn directory(path: impl Into<String>) -> Self {
        let mut path = normalize_path(&path.into());
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            path,
            data: Vec::new(),
            hash: ContentHash::compute(&[]),
            is_dir: true,
        }
    }

    /// How this entry takes part in relocation.
    pub fn kind(&self) -> EntryKind {
        EntryKind::of(&self.path)
    }

    /// Whether this is a compiled class file.
    pub fn is_class(&self) -> bool {
        !self.is_dir && self.kind() == EntryKind::Class
    }

    /// Content as UTF-8 text, if this is a non-class file that decodes cleanly.
    pub fn text(&self) -> Option<&str> {
        if self.is_dir || self.is_class() {
            return None;
        }
        std::str::from_utf8(&self.data).ok()
    }
}

/// Compression applied to every entry of a written archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Deflate at the codec's default level.
    #[default]
    Deflated,
    /// Deflate at maximum level.
    Maximum,
    /// No compression.
    Stored,
}

impl Compression {
    fn options(self) -> SimpleFileOptions {
        let base = SimpleFileOptions::default()
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);
        match self {
            Self::Deflated => base.compression_method(CompressionMethod::Deflated),
            Self::Maximum => base
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9)),
            Self::Stored => base.compression_method(CompressionMethod::Stored),
        }
    }
}

/// In-memory snapshot of an archive on disk.
///
/// Entries keep their on-disk order; lookups by path go through an index.
#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl Archive {
    /// Read every entry of the archive at `path`.
    ///
    /// Duplicate entry names keep their first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Io`] if the file cannot be opened and
    /// [`MergeError::Archive`] if it is not a readable ZIP container.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut zip =
            ZipArchive::new(BufReader::new(file)).map_err(|e| MergeError::archive(path, e))?;

        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).map_err(|e| MergeError::archive(path, e))?;
            let name = file.name().to_string();

            let entry = if file.is_dir() {
                ArchiveEntry::directory(name)
            } else {
                let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
                file.read_to_end(&mut data)?;
                ArchiveEntry::file(name, data)
            };

            entries.push(entry);
        }

        Ok(Self::from_entries(path, entries))
    }

    /// Build a snapshot from `entries`; a repeated path keeps its first entry.
    pub fn from_entries(path: impl Into<PathBuf>, entries: Vec<ArchiveEntry>) -> Self {
        let mut archive = Self {
            path: path.into(),
            entries: Vec::with_capacity(entries.len()),
            index: HashMap::with_capacity(entries.len()),
        };
        for entry in entries {
            if archive.index.contains_key(&entry.path) {
                debug!(archive = %archive.path.display(), entry = %entry.path, "skipping duplicate entry");
                continue;
            }
            archive.index.insert(entry.path.clone(), archive.entries.len());
            archive.entries.push(entry);
        }
        archive
    }

    /// An empty snapshot bound to `path`; nothing is written until [`Archive::write`].
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self::from_entries(path, Vec::new())
    }

    /// Path this snapshot was read from and is written back to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry, directories included, in archive order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Non-directory entries.
    pub fn files(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter().filter(|e| !e.is_dir)
    }

    /// Entry at `path`, if any.
    pub fn get(&self, path: &str) -> Option<&ArchiveEntry> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    /// Whether an entry exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Insert an entry, replacing any existing entry at the same path in place.
    pub fn insert(&mut self, entry: ArchiveEntry) {
        if let Some(&i) = self.index.get(&entry.path) {
            self.entries[i] = entry;
        } else {
            self.index.insert(entry.path.clone(), self.entries.len());
            self.entries.push(entry);
        }
    }

    /// Remove and return the entry at `path`.
    pub fn remove(&mut self, path: &str) -> Option<ArchiveEntry> {
        let removed = self.index.remove(path)?;
        let entry = self.entries.remove(removed);
        for slot in self.index.values_mut() {
            if *slot > removed {
                *slot -= 1;
            }
        }
        Some(entry)
    }

    /// Rename `from` to `to` in place.
    ///
    /// Returns `false` without touching the archive if `from` does not exist
    /// or `to` is already taken.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        let Some(&i) = self.index.get(from) else {
            return false;
        };
        if self.index.contains_key(to) {
            warn!(archive = %self.path.display(), from = %from, to = %to, "rename target already exists");
            return false;
        }
        self.index.remove(from);
        self.index.insert(to.to_string(), i);
        self.entries[i].path = to.to_string();
        true
    }

    /// Remove every entry for which `matches` returns true.
    pub fn remove_where(&mut self, mut matches: impl FnMut(&ArchiveEntry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !matches(e));
        if self.entries.len() != before {
            self.index = self
                .entries
                .iter()
                .enumerate()
                .map(|(i, e)| (e.path.clone(), i))
                .collect();
        }
        before - self.entries.len()
    }

    /// Atomically write this snapshot to its own path.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created or written,
    /// or if the final rename fails.
    pub fn write(&self, compression: Compression) -> Result<()> {
        self.write_to(&self.path, compression)
    }

    /// Atomically write this snapshot to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created or written,
    /// or if the final rename fails.
    pub fn write_to(&self, dest: &Path, compression: Compression) -> Result<()> {
        let dir = parent_dir(dest);
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".jarweld-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        self.write_zip(tmp.as_file_mut(), dest, compression)?;
        tmp.as_file().sync_all()?;
        tmp.persist(dest).map_err(io::Error::from)?;
        Ok(())
    }

    /// Encode this snapshot as an in-memory archive (for nesting).
    ///
    /// # Errors
    ///
    /// Returns an error if the codec fails.
    pub fn to_bytes(&self, compression: Compression) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_zip(&mut buffer, &self.path, compression)?;
        Ok(buffer.into_inner())
    }

    fn write_zip<W: Write + Seek>(
        &self,
        sink: W,
        label: &Path,
        compression: Compression,
    ) -> Result<()> {
        let zip_err = |e| MergeError::archive(label, e);
        let mut writer = ZipWriter::new(sink);
        let options = compression.options();
        for entry in &self.entries {
            if entry.is_dir {
                writer
                    .add_directory(entry.path.as_str(), options)
                    .map_err(zip_err)?;
            } else {
                writer
                    .start_file(entry.path.as_str(), options)
                    .map_err(zip_err)?;
                writer.write_all(&entry.data)?;
            }
        }
        writer.finish().map_err(zip_err)?;
        Ok(())
    }
}

/// Confirm that `path` is a readable archive without loading entry data.
///
/// Returns the number of entries in its central directory.
///
/// # Errors
///
/// Returns [`MergeError::Archive`] if the container cannot be parsed.
pub fn verify(path: &Path) -> Result<usize> {
    let file = File::open(path)?;
    let zip = ZipArchive::new(BufReader::new(file)).map_err(|e| MergeError::archive(path, e))?;
    Ok(zip.len())
}

/// Directory that holds `path`, or `.` for bare file names.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}
