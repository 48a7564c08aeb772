//! Metrics sink interface.

use serde::Serialize;

use super::cycle::CycleState;

/// Outcome of a change check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The cycle ran its preconditions successfully.
    Success,
    /// The cycle aborted.
    Error,
}

impl CheckStatus {
    /// Returns the label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Apply operation, named after the deployment state being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Starting an added deployment.
    Start,
    /// Restarting an updated deployment.
    Update,
    /// Stopping a removed deployment.
    Remove,
    /// Ensuring an unchanged deployment runs.
    Unchanged,
}

impl Operation {
    /// All operations, in label order.
    pub const ALL: [Self; 4] = [Self::Start, Self::Update, Self::Remove, Self::Unchanged];

    /// Returns the label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Result of an apply operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// The apply succeeded.
    Success,
    /// The apply failed or the manifest was invalid.
    Error,
}

impl OperationResult {
    /// Returns the label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Receiver of reconciliation metrics.
pub trait MetricsSink: Send + Sync {
    /// Records the outcome of a change check.
    fn track_check_status(&self, status: CheckStatus);

    /// Records one applied deployment.
    fn track_deployment_operation(&self, operation: Operation, result: OperationResult);

    /// Publishes the aggregate counts of the last cycle.
    fn track_deployment_state(&self, state: &CycleState);
}
