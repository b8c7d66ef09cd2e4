//! Shared types for jarweld.
//!
//! Namespaces, entry classification, content hashes and the descriptors
//! written into multi-version bundles. Everything here is plain data with no
//! I/O beyond hashing a file.

pub mod hash;
pub mod types;

// Re-exports
pub use hash::*;
pub use types::*;

/// Path of the JAR manifest inside an archive.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Directory holding `ServiceLoader` provider descriptors.
pub const SERVICES_PREFIX: &str = "META-INF/services/";

/// Suffix of compiled class entries.
pub const CLASS_SUFFIX: &str = ".class";

/// Header line of the two-column relocation table handed to the remapper.
pub const TINY_HEADER: &str = "tiny\t2\t0\toriginal\trelocated";
