//! Hash command

use anyhow::{Context, Result};
use jarweld_core::archive::Archive;
use std::path::PathBuf;

/// Print `<hash> <entry>` for every file in each archive.
///
/// These are the digests conflict detection compares: two entries at the
/// same path with the same hash are duplicates, not conflicts.
pub fn hash(archives: &[PathBuf]) -> Result<()> {
    for (i, path) in archives.iter().enumerate() {
        let archive =
            Archive::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
        if archives.len() > 1 {
            if i > 0 {
                println!();
            }
            println!("{}:", path.display());
        }
        for entry in archive.files() {
            println!("{} {}", entry.hash, entry.path);
        }
    }
    Ok(())
}
