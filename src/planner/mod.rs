//! Planning module for reconciliation cycles.
//!
//! This module classifies manifest paths from the two repository listings,
//! selects the deployments of each apply phase, and executes them with
//! outcome accounting.

mod diff;
mod executor;
mod plan;

pub use diff::{DiffEngine, DiffResult, ManifestDiff};
pub use executor::PhaseExecutor;
pub use plan::{Finding, Phase, SkipReason, finding, select, skip_reason};
