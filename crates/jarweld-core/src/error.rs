//! Domain-specific errors for merge operations

use std::io;
use std::path::PathBuf;

use jarweld_schema::{Namespace, NamespaceError};
use thiserror::Error;

use crate::remapper::RemapError;

/// Errors raised by the merge pipeline.
#[derive(Error, Debug)]
pub enum MergeError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A file is not a readable ZIP container.
    #[error("Failed to read archive {}: {source}", path.display())]
    Archive {
        /// The archive.
        path: PathBuf,
        /// Codec error.
        #[source]
        source: zip::result::ZipError,
    },

    /// A required input or the merged archive does not exist.
    #[error("Required input '{name}' not found at {}", path.display())]
    MissingInput {
        /// Namespace or role of the input.
        name: String,
        /// Where it was expected.
        path: PathBuf,
    },

    /// Nothing to merge.
    #[error("No input archives to merge")]
    NoInputs,

    /// An invalid namespace tag.
    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    /// Two inputs share a namespace.
    #[error("Namespace '{0}' is registered more than once")]
    DuplicateNamespace(Namespace),

    /// The bytecode remapper failed; the archive is unchanged.
    #[error("Remapping {} failed: {source}", archive.display())]
    Remap {
        /// Archive being remapped.
        archive: PathBuf,
        /// What the remapper reported.
        #[source]
        source: RemapError,
    },

    /// A relocation loop kept changing archives past its pass limit.
    #[error("{stage} relocation did not reach a fixed point within {passes} passes")]
    PassLimitExceeded {
        /// `class` or `resource`.
        stage: &'static str,
        /// The limit.
        passes: usize,
    },

    /// A collapse pair has nothing left to move.
    #[error("Cannot collapse '{source_prefix}' into '{destination}': source is not present in the merged archive")]
    CollapseSourceMissing {
        /// Namespaced class prefix, e.g. `forge/com/x/Util`.
        source_prefix: String,
        /// Canonical class prefix.
        destination: String,
    },

    /// Invalid configuration or arguments.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A descriptor could not be serialized.
    #[error("Descriptor serialization failed: {0}")]
    Descriptor(#[from] serde_json::Error),
}

impl MergeError {
    /// Wrap a zip error with the archive it came from.
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }
}

/// Result alias defaulting to [`MergeError`].
pub type Result<T, E = MergeError> = std::result::Result<T, E>;
