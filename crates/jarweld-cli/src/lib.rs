//! jarweld - merge namespaced JVM archives
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Builds of one project for several mod loaders ship classes and resources
//! at the same paths with different content. `jarweld merge` relocates every
//! conflicting entry under its loader's namespace and writes a single archive;
//! `jarweld merge-versions` bundles builds for several game versions into one
//! multiversion archive.
//!
//! # Work Layout
//!
//! ```text
//! $JARWELD_WORK_DIR (or ./.jarweld)/
//! └── jarweld-XXXXXX/   # per-run scratch, removed afterwards
//!     ├── inputs/       # working copies, one per namespace
//!     ├── tables/       # cumulative tiny mapping tables
//!     └── merged.jar    # combined archive before placement
//! ```

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "jarweld")]
#[command(author, version, about = "jarweld - merge namespaced JVM archives")]
pub struct Cli {
    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log every relocation decision
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter for the chosen verbosity; `RUST_LOG` overrides it.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge the archives listed in a configuration file
    Merge {
        /// Configuration file
        #[arg(short, long, env = "JARWELD_CONFIG", default_value = jarweld_core::config::CONFIG_FILE)]
        config: PathBuf,
        /// Override the configured output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Bundle builds for several game versions into one archive
    #[command(name = "merge-versions")]
    MergeVersions {
        /// Where the bundle is written
        #[arg(short, long)]
        output: PathBuf,
        /// Builds as RANGE=ARCHIVE; the range is read from mods.toml when omitted
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<String>,
    },
    /// List paths that conflict between archives, without merging
    Conflicts {
        /// Archives as NAMESPACE=ARCHIVE; the file stem is used when omitted
        #[arg(required = true, num_args = 2..)]
        archives: Vec<String>,
        /// Print JSON instead of a listing
        #[arg(long)]
        json: bool,
    },
    /// Print the content hash of every entry of an archive
    Hash {
        /// Archives to hash
        #[arg(required = true)]
        archives: Vec<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Split `LABEL=PATH`, returning `None` for the label if there is no `=`.
///
/// # Example
///
/// ```
/// use jarweld_cli::split_labelled;
/// use std::path::Path;
///
/// assert_eq!(split_labelled("forge=a.jar"), (Some("forge"), Path::new("a.jar")));
/// assert_eq!(split_labelled("a.jar"), (None, Path::new("a.jar")));
/// ```
pub fn split_labelled(arg: &str) -> (Option<&str>, &std::path::Path) {
    arg.split_once('=')
        .filter(|(label, _)| !label.is_empty())
        .map_or((None, std::path::Path::new(arg)), |(label, path)| {
            (Some(label), std::path::Path::new(path))
        })
}
