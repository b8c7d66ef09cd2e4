//! Shared fixtures for pipeline tests.
//!
//! Class files here are text: a `class <name>` line followed by any number of
//! `ref <name>` lines. [`StructuralRemapper`] applies a tiny table to that
//! format the way a bytecode remapper would: it moves every mapped class and
//! rewrites every mapped name inside every class, leaving other entries
//! untouched.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use jarweld_core::archive::{Archive, ArchiveEntry, Compression};
use jarweld_core::{RemapError, Remapper};

#[derive(Debug, Default)]
pub struct StructuralRemapper {
    calls: AtomicUsize,
}

impl StructuralRemapper {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn read_table(path: &Path) -> Result<HashMap<String, String>, RemapError> {
    let text = std::fs::read_to_string(path).map_err(|e| RemapError::Other(e.to_string()))?;
    let mut lines = text.lines();
    if lines.next() != Some("tiny\t2\t0\toriginal\trelocated") {
        return Err(RemapError::Other("bad tiny header".into()));
    }
    lines
        .map(|line| match line.split('\t').collect::<Vec<_>>().as_slice() {
            ["c", from, to] => Ok(((*from).to_string(), (*to).to_string())),
            _ => Err(RemapError::Other(format!("bad row: {line}"))),
        })
        .collect()
}

impl Remapper for StructuralRemapper {
    fn remap(&self, input: &Path, output: &Path, mappings: &Path) -> Result<(), RemapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rows = read_table(mappings)?;
        let archive = Archive::open(input).map_err(|e| RemapError::Other(e.to_string()))?;

        let mut entries = Vec::new();
        for entry in archive.entries() {
            let Some(name) = entry.path.strip_suffix(".class").filter(|_| !entry.is_dir) else {
                entries.push(entry.clone());
                continue;
            };
            let path = rows
                .get(name)
                .map_or_else(|| entry.path.clone(), |to| format!("{to}.class"));
            let body = String::from_utf8_lossy(&entry.data)
                .lines()
                .map(|line| match line.split_once(' ') {
                    Some((kind @ ("class" | "ref"), target)) => {
                        format!("{kind} {}", rows.get(target).map_or(target, String::as_str))
                    }
                    _ => line.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n");
            entries.push(ArchiveEntry::file(path, body));
        }

        Archive::from_entries(output, entries)
            .write(Compression::Deflated)
            .map_err(|e| RemapError::Other(e.to_string()))
    }
}

/// A class body in the fixture format.
pub fn class(name: &str, refs: &[&str], extra: &str) -> String {
    let mut body = format!("class {name}");
    for r in refs {
        body.push_str(&format!("\nref {r}"));
    }
    if !extra.is_empty() {
        body.push('\n');
        body.push_str(extra);
    }
    body
}

/// Write an archive with the given `(path, content)` files.
pub fn jar(dir: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let entries = files
        .iter()
        .map(|(entry, content)| ArchiveEntry::file(*entry, content.as_bytes().to_vec()))
        .collect();
    Archive::from_entries(&path, entries)
        .write(Compression::Deflated)
        .expect("write fixture archive");
    path
}

/// Content of `entry` in the archive at `path` as text.
pub fn text(path: &Path, entry: &str) -> String {
    let archive = Archive::open(path).expect("open archive");
    let entry = archive
        .get(entry)
        .unwrap_or_else(|| panic!("missing entry {entry}"));
    String::from_utf8(entry.data.clone()).expect("utf-8 entry")
}
