pub mod completions;
pub mod conflicts;
pub mod hash;
pub mod merge;
pub mod merge_versions;
