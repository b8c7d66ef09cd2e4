//! jarweld CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use jarweld_cli::cmd;
use jarweld_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Merge { config, output } => cmd::merge::merge(&config, output.as_deref(), cli.quiet),
        Commands::MergeVersions { output, inputs } => {
            cmd::merge_versions::merge_versions(&inputs, &output, cli.quiet)
        }
        Commands::Conflicts { archives, json } => cmd::conflicts::conflicts(&archives, json),
        Commands::Hash { archives } => cmd::hash::hash(&archives),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
