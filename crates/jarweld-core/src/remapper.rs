//! Bytecode remapper seam.
//!
//! Rewriting class files (constant pools, descriptors, signatures) is left to
//! an external tool. The core treats it as a pure function
//! `(input archive, mapping table) → output archive`: it never assumes the
//! tool can work in place, and it re-invokes it with the cumulative table on
//! every pass.
//!
//! # Implementation Note: argument templates
//! [`CommandRemapper`] substitutes `{input}`, `{output}` and `{mappings}` into
//! its argument list. The default template matches the tiny-remapper CLI
//! (`<input> <output> <mappings> <from> <to>`), so a configuration of
//! `command = ["java", "-jar", "tiny-remapper-fat.jar"]` is enough.

use std::path::Path;
use std::process::Command;

use thiserror::Error;
use tracing::debug;

/// Why a remap invocation failed.
#[derive(Error, Debug)]
pub enum RemapError {
    /// The program is not on `PATH`.
    #[error("remapper '{0}' not found on PATH")]
    NotFound(String),

    /// The program could not be started.
    #[error("failed to spawn remapper '{program}': {source}")]
    Spawn {
        /// Program name as configured.
        program: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The program exited unsuccessfully.
    #[error("remapper exited with {status}: {stderr}")]
    Failed {
        /// Exit status as displayed by the OS.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The program succeeded but wrote nothing.
    #[error("remapper produced no output archive")]
    MissingOutput,

    /// Any other failure, e.g. from an in-process remapper.
    #[error("{0}")]
    Other(String),
}

/// Applies a tiny mapping table to an archive.
///
/// Implementations must rewrite every class and every symbolic reference to
/// a mapped class, copy non-class entries through unchanged, and tolerate
/// tables whose rows no longer match anything in `input`.
pub trait Remapper: Send + Sync {
    /// Read `input`, apply `mappings`, write the result to `output`.
    ///
    /// # Errors
    ///
    /// Returns a [`RemapError`] if the rewrite cannot be performed.
    fn remap(&self, input: &Path, output: &Path, mappings: &Path) -> Result<(), RemapError>;
}

impl<T: Remapper + ?Sized> Remapper for std::sync::Arc<T> {
    fn remap(&self, input: &Path, output: &Path, mappings: &Path) -> Result<(), RemapError> {
        (**self).remap(input, output, mappings)
    }
}

impl<T: Remapper + ?Sized> Remapper for &T {
    fn remap(&self, input: &Path, output: &Path, mappings: &Path) -> Result<(), RemapError> {
        (**self).remap(input, output, mappings)
    }
}

/// Runs an external program as the remapper.
#[derive(Debug, Clone)]
pub struct CommandRemapper {
    program: String,
    leading_args: Vec<String>,
    args: Vec<String>,
}

impl CommandRemapper {
    /// Default argument template (tiny-remapper CLI order).
    pub const DEFAULT_ARGS: [&'static str; 5] =
        ["{input}", "{output}", "{mappings}", "original", "relocated"];

    /// Build from a command line such as `["java", "-jar", "remapper.jar"]`.
    ///
    /// # Errors
    ///
    /// Returns [`RemapError::Other`] if `command` is empty.
    pub fn new(command: &[String]) -> Result<Self, RemapError> {
        let (program, leading) = command
            .split_first()
            .ok_or_else(|| RemapError::Other("remapper command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            leading_args: leading.to_vec(),
            args: Self::DEFAULT_ARGS.iter().map(ToString::to_string).collect(),
        })
    }

    /// Replace the argument template appended after the command.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    fn render_args(&self, input: &Path, output: &Path, mappings: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let mappings = mappings.to_string_lossy();
        self.leading_args
            .iter()
            .chain(&self.args)
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{mappings}", &mappings)
            })
            .collect()
    }
}

impl Remapper for CommandRemapper {
    fn remap(&self, input: &Path, output: &Path, mappings: &Path) -> Result<(), RemapError> {
        let args = self.render_args(input, output, mappings);
        debug!(program = %self.program, ?args, "invoking remapper");

        let result = match Command::new(&self.program).args(&args).output() {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RemapError::NotFound(self.program.clone()));
            }
            Err(e) => {
                return Err(RemapError::Spawn {
                    program: self.program.clone(),
                    source: e,
                });
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(RemapError::Failed {
                status: result.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        if !output.exists() {
            return Err(RemapError::MissingOutput);
        }

        Ok(())
    }
}
