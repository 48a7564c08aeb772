//! CLI module for the gitops-compose daemon.
//!
//! This module provides the command-line interface for running the daemon
//! and inspecting manifests.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::{ManifestSummary, OutputFormatter, ServiceSummary};
