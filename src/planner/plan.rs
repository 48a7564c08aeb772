//! Phase selection for a reconciliation cycle.
//!
//! A cycle applies deployments in two phases separated by the repository
//! pull: removed stacks are stopped first, everything else is applied after
//! the working copy has been updated.

use crate::deployment::{Deployment, DeploymentState};

/// Phases of a cycle that touch the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Stop removed deployments, before the pull.
    Stop,
    /// Apply added, updated and unchanged deployments, after the pull.
    Apply,
}

/// Why a deployment is left out of the apply phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Carries the ignore label.
    Ignored,
    /// Carries the controller label.
    Controller,
}

/// Finding of the post-apply pass over all deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finding {
    /// Ignored deployment, counted as ignored.
    Ignored,
    /// Controller deployment removed from the repository.
    ControllerRemoved,
    /// Controller deployment added to the repository.
    ControllerAdded,
    /// Controller deployment with a changed manifest.
    ControllerUpdated,
}

/// Returns why a deployment is skipped, if it is.
#[must_use]
pub const fn skip_reason(deployment: &Deployment) -> Option<SkipReason> {
    if deployment.is_ignored() {
        Some(SkipReason::Ignored)
    } else if deployment.is_controller() {
        Some(SkipReason::Controller)
    } else {
        None
    }
}

/// Selects the indices of the deployments applied in a phase.
#[must_use]
pub fn select(phase: Phase, deployments: &[Deployment]) -> Vec<usize> {
    deployments
        .iter()
        .enumerate()
        .filter(|(_, d)| skip_reason(d).is_none())
        .filter(|(_, d)| match phase {
            Phase::Stop => d.state == DeploymentState::Removed,
            Phase::Apply => d.state != DeploymentState::Removed,
        })
        .map(|(i, _)| i)
        .collect()
}

/// Returns the post-pass finding for a deployment, if any.
#[must_use]
pub const fn finding(deployment: &Deployment) -> Option<Finding> {
    match skip_reason(deployment) {
        Some(SkipReason::Ignored) => Some(Finding::Ignored),
        Some(SkipReason::Controller) => match deployment.state {
            DeploymentState::Removed => Some(Finding::ControllerRemoved),
            DeploymentState::Added => Some(Finding::ControllerAdded),
            DeploymentState::Updated => Some(Finding::ControllerUpdated),
            DeploymentState::Unchanged => None,
        },
        None => None,
    }
}
