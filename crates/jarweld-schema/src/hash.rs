//! Content hashing.

use serde::{Deserialize, Serialize};

/// BLAKE3 digest of an archive entry's bytes.
///
/// Used as the identity of an entry's content: two entries at the same path
/// with equal `ContentHash` are duplicates, not conflicts. BLAKE3 is fast
/// enough to hash every entry of every input on each relocation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(blake3::Hash);

impl ContentHash {
    /// Compute the digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        Self(blake3::hash(data))
    }

    /// Compute the digest of a file by reading it entirely into memory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn compute_file(path: &std::path::Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::compute(&data))
    }

    /// Lowercase hex rendering (64 characters).
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}
