// ============================================================================
// Linting
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![warn(non_camel_case_types)]        // Types must follow CamelCase convention
#![warn(unused_must_use)]             // Must handle Result and Option explicitly
#![warn(nonstandard_style)]           // Non-standard code style is flagged
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # gitops-compose
//!
//! A continuous-deployment daemon that keeps Docker Compose stacks on one host
//! in sync with a git repository.
//!
//! ## Overview
//!
//! Every `docker-compose.yml` in the tracked branch is one deployment. The
//! daemon periodically (or on a webhook) checks the remote for new commits
//! and reconciles:
//!
//! - Manifests removed from the repository are stopped
//! - Manifests added to the repository are started
//! - Manifests whose resolved content or watch files changed are restarted
//! - Unchanged manifests are restarted if they stopped running
//!
//! ## Architecture
//!
//! 1. **Repository**: lists manifests at the local and remote heads
//! 2. **Stack runtime**: loads, fingerprints, starts and stops compose stacks
//! 3. **Reconciler**: diffs the listings and applies every deployment
//! 4. **Scheduler**: serialises cycles from the timer and the webhook
//!
//! ## Modules
//!
//! - [`config`]: Settings from the environment and their validation
//! - [`manifest`]: Compose manifest parsing, labels and fingerprints
//! - [`git`]: Repository listing, change detection and pull
//! - [`docker`]: Compose CLI runtime and registry login
//! - [`deployment`]: The deployment state machine
//! - [`planner`]: Listing diff and phase execution
//! - [`reconciler`]: The reconciliation cycle
//! - [`scheduler`]: Trigger queue and worker
//! - [`metrics`]: Prometheus metrics and the status board
//! - [`server`]: HTTP surface
//! - [`cli`]: Command-line interface
//!
//! ## Labels
//!
//! ```yaml
//! services:
//!   app:
//!     image: ghcr.io/my-org/app:latest
//!     labels:
//!       gitops.ignore: "true"      # never touched by the daemon
//!   agent:
//!     image: ghcr.io/my-org/gitops-compose:latest
//!     labels:
//!       - gitops.controller=true   # the daemon's own stack
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod deployment;
pub mod docker;
pub mod error;
pub mod git;
pub mod manifest;
pub mod metrics;
pub mod planner;
pub mod reconciler;
pub mod scheduler;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigValidator, Settings};
pub use deployment::{Deployment, DeploymentState};
pub use docker::{ComposeStack, RegistryClient, Stack};
pub use error::{GitopsError, Result};
pub use git::{GitRepository, ManifestRepository};
pub use manifest::{ManifestHasher, ManifestParser};
pub use metrics::{CycleState, MetricsSink, PrometheusMetrics, StatusBoard};
pub use planner::DiffEngine;
pub use reconciler::{CycleReport, Reconciler};
pub use scheduler::{Scheduler, TriggerHandle, TriggerSource};
pub use server::{AppState, Server};
