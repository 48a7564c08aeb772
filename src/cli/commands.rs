//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gitops-compose - Continuous deployment of compose stacks from a git repository.
#[derive(Parser, Debug)]
#[command(name = "gitops-compose")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the `.env` file loaded before reading settings.
    #[arg(long, global = true, env = "GITOPS_ENV_FILE", default_value = ".env")]
    pub env_file: PathBuf,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute. Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the daemon.
    Run,

    /// Run one full reconciliation cycle and print the counts.
    Check,

    /// Load a compose manifest and print its fingerprint and labels.
    Validate {
        /// Path of the manifest.
        manifest: PathBuf,
    },

    /// List manifests at the local and remote heads with their classification.
    Manifests,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the command to run.
    #[must_use]
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_run() {
        let cli = Cli::try_parse_from(["gitops-compose"]).expect("parse");
        assert_eq!(cli.command(), Commands::Run);
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gitops-compose",
            "validate",
            "stack/docker-compose.yml",
            "--output",
            "json",
            "-v",
        ])
        .expect("parse");

        assert_eq!(
            cli.command(),
            Commands::Validate {
                manifest: PathBuf::from("stack/docker-compose.yml")
            }
        );
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn test_rejects_unknown_output() {
        assert!(Cli::try_parse_from(["gitops-compose", "--output", "yaml", "check"]).is_err());
    }
}
