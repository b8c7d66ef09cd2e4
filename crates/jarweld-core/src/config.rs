//! Merge configuration parsing.
//!
//! A `jarweld.toml` names the inputs of a merge, where the result goes, and
//! how the external remapper is invoked:
//!
//! ```toml
//! output = "build/merged.jar"
//! collapse = ["com.example.api.Api"]
//!
//! [manifest]
//! Implementation-Title = "example"
//!
//! [remapper]
//! command = ["java", "-jar", "tiny-remapper-fat.jar"]
//!
//! [[input]]
//! namespace = "forge"
//! path = "forge/build/libs/example-forge.jar"
//!
//! [[input]]
//! namespace = "quilt"
//! path = "quilt/build/libs/example-quilt.jar"
//! required = false
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect::VariantPolicy;
use crate::error::{MergeError, Result};
use crate::remapper::{CommandRemapper, RemapError};

/// Default bound on passes of each relocation loop.
pub const DEFAULT_MAX_PASSES: usize = 32;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "jarweld.toml";

/// Top-level merge configuration parsed from a `jarweld.toml` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Where the merged archive is written.
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Scratch directory; defaults to [`crate::paths::work_root`].
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    /// Bound on passes of each relocation loop.
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
    /// Relocate every owner of a conflicting path, not only the first owner
    /// of each distinct content.
    #[serde(default)]
    pub relocate_all_owners: bool,
    /// Class names to collapse back to one canonical copy.
    #[serde(default)]
    pub collapse: Vec<String>,
    /// Worker threads; defaults to the number of CPUs.
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Extra main attributes for the merged manifest.
    #[serde(default)]
    pub manifest: BTreeMap<String, String>,
    /// How the bytecode remapper is run.
    #[serde(default)]
    pub remapper: RemapperConfig,
    /// Inputs in registration order.
    #[serde(default, rename = "input")]
    pub inputs: Vec<InputConfig>,
}

/// The `[remapper]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemapperConfig {
    /// Program and leading arguments.
    pub command: Vec<String>,
    /// Argument template with `{input}`, `{output}` and `{mappings}`
    /// placeholders; defaults to the tiny-remapper order.
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

impl Default for RemapperConfig {
    fn default() -> Self {
        Self {
            command: vec!["tiny-remapper".to_string()],
            args: None,
        }
    }
}

impl RemapperConfig {
    /// Build the configured remapper.
    ///
    /// # Errors
    ///
    /// Returns an error if `command` is empty.
    pub fn build(&self) -> std::result::Result<CommandRemapper, RemapError> {
        let remapper = CommandRemapper::new(&self.command)?;
        Ok(match &self.args {
            Some(args) => remapper.with_args(args.clone()),
            None => remapper,
        })
    }
}

/// A single `[[input]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Relocation tag, validated when the input is registered.
    pub namespace: String,
    /// The archive.
    pub path: PathBuf,
    /// A missing required input aborts the merge; a missing optional one is
    /// skipped with a warning.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_output() -> PathBuf {
    PathBuf::from("merged.jar")
}

fn default_max_passes() -> usize {
    DEFAULT_MAX_PASSES
}

fn default_required() -> bool {
    true
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            work_dir: None,
            max_passes: DEFAULT_MAX_PASSES,
            relocate_all_owners: false,
            collapse: Vec::new(),
            jobs: None,
            manifest: BTreeMap::new(),
            remapper: RemapperConfig::default(),
            inputs: Vec::new(),
        }
    }
}

impl MergeConfig {
    /// Load and parse a `MergeConfig` from the given file path, resolving
    /// relative paths against its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML
    /// conforming to the schema, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)
            .map_err(|e| MergeError::Config(format!("{}: {e}", path.display())))?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Config`] on a syntax or validation error.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| MergeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_passes == 0 {
            return Err(MergeError::Config("max_passes must be at least 1".into()));
        }
        if self.jobs == Some(0) {
            return Err(MergeError::Config("jobs must be at least 1".into()));
        }
        if self.remapper.command.is_empty() {
            return Err(MergeError::Config("remapper.command must not be empty".into()));
        }
        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.output);
        if let Some(work) = self.work_dir.as_mut() {
            resolve(work);
        }
        for input in &mut self.inputs {
            resolve(&mut input.path);
        }
    }

    /// Relocation policy selected by `relocate_all_owners`.
    pub fn policy(&self) -> VariantPolicy {
        if self.relocate_all_owners {
            VariantPolicy::AllOwners
        } else {
            VariantPolicy::FirstSeen
        }
    }

    /// Configured worker count, else the number of CPUs.
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get)
    }
}
