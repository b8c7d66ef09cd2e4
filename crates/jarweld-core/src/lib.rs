//! Merging of namespaced JVM archives.
//!
//! Several builds of one project (one per mod loader, say) ship classes and
//! resources at the same paths with different content. This crate relocates
//! every conflicting entry under its archive's namespace, rewrites the
//! references to it, and combines the results into one archive.

pub mod archive;
pub mod collapse;
pub mod combine;
pub mod config;
pub mod detect;
pub mod error;
pub mod manifest;
pub mod mapping;
pub mod merge;
pub mod multiversion;
pub mod namespaced;
pub mod paths;
pub mod relocate;
pub mod remapper;
pub mod reporter;
pub mod resources;
pub mod rewrite;
pub mod version_range;

pub use error::{MergeError, Result};
pub use merge::{InputArchive, MergeReport, Merger};
pub use remapper::{CommandRemapper, RemapError, Remapper};
pub use reporter::{NullReporter, Reporter};
