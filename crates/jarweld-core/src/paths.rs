//! Work directory layout.

use std::path::{Path, PathBuf};

/// Environment variable overriding the work root.
pub const WORK_DIR_ENV: &str = "JARWELD_WORK_DIR";

/// Returns the work root: `$JARWELD_WORK_DIR`, else `<cwd>/.jarweld`.
///
/// # Errors
///
/// Returns an error if the variable is unset and the current directory
/// cannot be determined.
pub fn work_root() -> std::io::Result<PathBuf> {
    if let Some(val) = std::env::var_os(WORK_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(val));
    }
    Ok(std::env::current_dir()?.join(".jarweld"))
}

/// Working copies of the inputs: <work>/inputs
pub fn inputs_dir(work: &Path) -> PathBuf {
    work.join("inputs")
}

/// Tiny mapping tables: <work>/tables
pub fn tables_dir(work: &Path) -> PathBuf {
    work.join("tables")
}

/// Combined archive before collapse and final placement: <work>/merged.jar
pub fn staging_path(work: &Path) -> PathBuf {
    work.join("merged.jar")
}
