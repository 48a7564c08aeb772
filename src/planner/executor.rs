//! Applies deployments and accounts for their outcomes.

use tracing::{error, info, warn};

use crate::deployment::{Deployment, DeploymentState};
use crate::docker::Stack;
use crate::error::DeployError;
use crate::metrics::{CycleState, MetricsSink, OperationResult};

use super::plan::{Finding, finding};

/// Executor for the apply phases of a cycle.
pub struct PhaseExecutor<'a> {
    /// Container runtime.
    stack: &'a dyn Stack,
    /// Metrics receiver.
    metrics: &'a dyn MetricsSink,
}

impl<'a> PhaseExecutor<'a> {
    /// Creates a new phase executor.
    #[must_use]
    pub const fn new(stack: &'a dyn Stack, metrics: &'a dyn MetricsSink) -> Self {
        Self { stack, metrics }
    }

    /// Applies one deployment and records the outcome in `state`.
    pub async fn apply(&self, deployment: &mut Deployment, state: &mut CycleState) {
        let operation = deployment.state.operation();
        let file = deployment.path.display().to_string();

        let changed = match deployment.apply(self.stack).await {
            Ok(changed) => changed,
            Err(DeployError::InvalidManifest) => {
                state.invalid += 1;
                self.metrics
                    .track_deployment_operation(operation, OperationResult::Error);
                error!(file = %file, "Invalid compose file");
                return;
            }
            Err(e) => {
                state.failed += 1;
                self.metrics
                    .track_deployment_operation(operation, OperationResult::Error);
                if deployment.state == DeploymentState::Unchanged {
                    error!(file = %file, error = %e, "Error checking unchanged deployment");
                } else {
                    error!(
                        file = %file,
                        operation = operation.as_str(),
                        error = %e,
                        "Error applying deployment change"
                    );
                }
                return;
            }
        };

        self.metrics
            .track_deployment_operation(operation, OperationResult::Success);

        match (deployment.state, changed) {
            (DeploymentState::Added, true) => {
                state.started += 1;
                info!(file = %file, "Started new deployment");
            }
            (DeploymentState::Added, false) => {
                state.unchanged += 1;
                warn!(file = %file, "New deployment was already running");
            }
            (DeploymentState::Updated, true) => {
                state.updated += 1;
                info!(file = %file, "Updated deployment");
            }
            (DeploymentState::Updated, false) => {
                state.unchanged += 1;
                warn!(file = %file, "Updated deployment was already running");
            }
            (DeploymentState::Removed, true) => {
                state.stopped += 1;
                info!(file = %file, "Stopped removed deployment");
            }
            (DeploymentState::Removed, false) => {
                state.unchanged += 1;
                warn!(file = %file, "Removed deployment was not running");
            }
            (DeploymentState::Unchanged, true) => {
                state.started += 1;
                warn!(file = %file, "Started unchanged deployment that was not running");
            }
            (DeploymentState::Unchanged, false) => {
                state.unchanged += 1;
            }
        }
    }

    /// Accounts for deployments left out of the apply phases.
    pub fn post_pass(deployments: &[Deployment], state: &mut CycleState) {
        for deployment in deployments {
            let file = deployment.path.display();
            match finding(deployment) {
                Some(Finding::Ignored) => {
                    state.ignored += 1;
                    info!(file = %file, "Skipping deployment due to gitops ignore label");
                }
                Some(Finding::ControllerRemoved) => {
                    state.failed += 1;
                    error!(file = %file, "Cannot remove controller deployment");
                }
                Some(Finding::ControllerAdded) => {
                    state.failed += 1;
                    error!(file = %file, "Cannot add controller deployment");
                }
                Some(Finding::ControllerUpdated) => {
                    error!(file = %file, "Updating the controller deployment is not supported");
                }
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Operation;
    use crate::testing::{FakeStack, RecordingMetrics};

    const PATH: &str = "/repo/app/docker-compose.yml";

    async fn run(stack: &FakeStack, state: DeploymentState) -> (CycleState, RecordingMetrics) {
        let metrics = RecordingMetrics::default();
        let mut deployment = Deployment::new(PATH).with_state(state);
        let _ = deployment.load_config(stack).await;

        let mut counts = CycleState::default();
        PhaseExecutor::new(stack, &metrics)
            .apply(&mut deployment, &mut counts)
            .await;
        (counts, metrics)
    }

    #[tokio::test]
    async fn test_added_counts_started() {
        let stack = FakeStack::new().with_manifest(PATH, "v1");
        let (counts, metrics) = run(&stack, DeploymentState::Added).await;
        assert_eq!(counts.started, 1);
        assert_eq!(
            metrics.operations(),
            vec![(Operation::Start, OperationResult::Success)]
        );
    }

    #[tokio::test]
    async fn test_updated_counts_updated() {
        let stack = FakeStack::new().with_manifest(PATH, "v1").running(PATH);
        let (counts, metrics) = run(&stack, DeploymentState::Updated).await;
        assert_eq!(counts.updated, 1);
        assert_eq!(
            metrics.operations(),
            vec![(Operation::Update, OperationResult::Success)]
        );
    }

    #[tokio::test]
    async fn test_removed_not_running_counts_unchanged() {
        let stack = FakeStack::new().with_manifest(PATH, "v1");
        let (counts, _) = run(&stack, DeploymentState::Removed).await;
        assert_eq!(counts.unchanged, 1);
        assert_eq!(counts.stopped, 0);
    }

    #[tokio::test]
    async fn test_drift_is_healed() {
        let stack = FakeStack::new().with_manifest(PATH, "v1");
        let (counts, _) = run(&stack, DeploymentState::Unchanged).await;
        assert_eq!(counts.started, 1);
    }

    #[tokio::test]
    async fn test_invalid_and_failed() {
        let stack = FakeStack::new();
        let (counts, metrics) = run(&stack, DeploymentState::Unchanged).await;
        assert_eq!(counts.invalid, 1);
        assert_eq!(
            metrics.operations(),
            vec![(Operation::Unchanged, OperationResult::Error)]
        );

        let stack = FakeStack::new().with_manifest(PATH, "v1").failing_pull(PATH);
        let (counts, _) = run(&stack, DeploymentState::Unchanged).await;
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.invalid, 0);
    }

    #[tokio::test]
    async fn test_post_pass_counts() {
        let stack = FakeStack::new()
            .with_labels("/repo/ign/docker-compose.yml", "i", true, false)
            .with_labels("/repo/ign2/docker-compose.yml", "i2", true, false)
            .with_labels("/repo/ctl/docker-compose.yml", "c", false, true)
            .with_labels("/repo/new-ctl/docker-compose.yml", "n", false, true);

        let mut deployments = vec![
            Deployment::new("/repo/ign/docker-compose.yml"),
            Deployment::new("/repo/ign2/docker-compose.yml").with_state(DeploymentState::Removed),
            Deployment::new("/repo/ctl/docker-compose.yml").with_state(DeploymentState::Updated),
            Deployment::new("/repo/new-ctl/docker-compose.yml").with_state(DeploymentState::Added),
        ];
        for d in &mut deployments {
            d.load_config(&stack).await.expect("load");
        }

        let mut counts = CycleState::default();
        PhaseExecutor::post_pass(&deployments, &mut counts);

        assert_eq!(counts.ignored, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total(), 3);
    }
}
