//! Reconciler for keeping deployments in sync with the repository.
//!
//! Each cycle first asks the repository whether the remote moved. When it
//! did, or on the first cycle, the reconciler diffs the manifest listings and
//! applies every deployment in order: removed stacks are stopped, the working
//! copy is pulled, then added, updated and unchanged stacks are applied.
//! Otherwise only the deployments that failed on an image pull are retried.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::deployment::{Deployment, DeploymentState};
use crate::docker::{RegistryAuthenticator, Stack};
use crate::error::{CyclePhase, Result};
use crate::git::ManifestRepository;
use crate::metrics::{CheckStatus, CycleState, MetricsSink, StatusBoard};
use crate::planner::{DiffEngine, Phase, PhaseExecutor, select};
use crate::scheduler::TriggerSource;

/// Reconciler for maintaining desired state.
///
/// Owns the retry set and the counts of the last cycle; it is driven by a
/// single worker, so cycles never overlap.
pub struct Reconciler {
    /// Manifest source.
    repository: Arc<dyn ManifestRepository>,
    /// Container runtime.
    stack: Arc<dyn Stack>,
    /// Registry login.
    registry: Arc<dyn RegistryAuthenticator>,
    /// Metrics receiver.
    metrics: Arc<dyn MetricsSink>,
    /// Status shared with the HTTP surface.
    status: StatusBoard,
    /// Diff engine.
    diff_engine: DiffEngine,
    /// Deployments to re-apply on the next idle cycle.
    retry: Vec<Deployment>,
    /// Counts of the last cycle.
    state: CycleState,
    /// Set until a full pass has completed.
    first_check: bool,
}

/// Kind of work a cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleMode {
    /// The change check failed; nothing was applied.
    CheckFailed,
    /// All manifests were diffed and applied.
    FullDiff,
    /// Only the retry set was re-applied.
    RetryOnly,
}

/// Outcome of one deployment in a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentOutcome {
    /// Manifest path.
    pub path: PathBuf,
    /// Classification.
    pub state: DeploymentState,
    /// Whether the manifest loaded.
    pub valid: bool,
    /// Ignore label.
    pub ignored: bool,
    /// Controller label.
    pub controller: bool,
    /// Error of the apply, if any.
    pub error: Option<String>,
}

impl From<&Deployment> for DeploymentOutcome {
    fn from(deployment: &Deployment) -> Self {
        Self {
            path: deployment.path.clone(),
            state: deployment.state,
            valid: deployment.config().valid,
            ignored: deployment.is_ignored(),
            controller: deployment.is_controller(),
            error: deployment.error().map(ToString::to_string),
        }
    }
}

/// Result of a reconciliation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Cycle identifier, also attached to the cycle's log span.
    pub cycle_id: Uuid,
    /// What triggered the cycle.
    pub trigger: TriggerSource,
    /// Check outcome.
    pub status: CheckStatus,
    /// Kind of work done.
    pub mode: CycleMode,
    /// Counts after the cycle.
    pub state: CycleState,
    /// Deployments applied in this cycle.
    pub deployments: Vec<DeploymentOutcome>,
    /// Manifests waiting for a retry.
    pub pending_retries: Vec<PathBuf>,
    /// Error that aborted the cycle.
    pub error: Option<String>,
}

impl Reconciler {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(
        repository: Arc<dyn ManifestRepository>,
        stack: Arc<dyn Stack>,
        registry: Arc<dyn RegistryAuthenticator>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            repository,
            stack,
            registry,
            metrics,
            status: StatusBoard::new(),
            diff_engine: DiffEngine::new(),
            retry: Vec::new(),
            state: CycleState::default(),
            first_check: true,
        }
    }

    /// Uses a shared status board.
    #[must_use]
    pub fn with_status(mut self, status: StatusBoard) -> Self {
        self.status = status;
        self
    }

    /// Returns the status board.
    #[must_use]
    pub fn status(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Returns the manifests waiting for a retry.
    #[must_use]
    pub fn pending_retries(&self) -> Vec<PathBuf> {
        self.retry.iter().map(|d| d.path.clone()).collect()
    }

    /// Runs one reconciliation cycle.
    ///
    /// Never fails: aborted cycles are reported through the check status,
    /// the log and the returned report.
    pub async fn run_cycle(&mut self, trigger: TriggerSource) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", id = %cycle_id, trigger = %trigger);
        self.run_cycle_inner(cycle_id, trigger).instrument(span).await
    }

    async fn run_cycle_inner(&mut self, cycle_id: Uuid, trigger: TriggerSource) -> CycleReport {
        let mut report = CycleReport {
            cycle_id,
            trigger,
            status: CheckStatus::Success,
            mode: CycleMode::CheckFailed,
            state: self.state,
            deployments: Vec::new(),
            pending_retries: self.pending_retries(),
            error: None,
        };

        let has_changes = match self.repository.has_remote_changes().await {
            Ok(has_changes) => has_changes,
            Err(e) => {
                let e = e.aborted(CyclePhase::ChangeDetection);
                self.metrics.track_check_status(CheckStatus::Error);
                error!(error = %e, "Error checking for git changes");
                report.status = CheckStatus::Error;
                report.error = Some(e.to_string());
                self.status.record_cycle(
                    report.status,
                    &trigger.to_string(),
                    self.state,
                    report.pending_retries.clone(),
                );
                return report;
            }
        };

        self.metrics.track_check_status(CheckStatus::Success);
        if has_changes {
            info!("Git changes detected");
        } else if self.first_check {
            info!("First run, ensuring all deployments are running");
        } else {
            info!("No git changes detected");
        }

        if has_changes || self.first_check {
            report.mode = CycleMode::FullDiff;
            match self.full_diff().await {
                Ok(deployments) => {
                    self.first_check = false;
                    self.retry = deployments.iter().filter(|d| d.needs_retry()).cloned().collect();
                    report.deployments = deployments.iter().map(DeploymentOutcome::from).collect();
                }
                Err(e) => {
                    self.metrics.track_check_status(CheckStatus::Error);
                    error!(error = %e, "Error checking and updating deployments");
                    report.status = CheckStatus::Error;
                    report.error = Some(e.to_string());
                }
            }
        } else {
            report.mode = CycleMode::RetryOnly;
            report.deployments = self.retry_pass().await;
        }

        for deployment in &self.retry {
            info!(
                file = %deployment.path.display(),
                "Scheduling deployment for retry due to image pull backoff"
            );
        }

        self.metrics.track_deployment_state(&self.state);

        report.state = self.state;
        report.pending_retries = self.pending_retries();
        self.status.record_cycle(
            report.status,
            &trigger.to_string(),
            self.state,
            report.pending_retries.clone(),
        );

        info!(counts = %self.state, mode = ?report.mode, "Cycle finished");
        report
    }

    /// Diffs both listings and applies every deployment in phase order.
    async fn full_diff(&mut self) -> Result<Vec<Deployment>> {
        let local = self
            .repository
            .list_local_manifests()
            .await
            .map_err(|e| e.aborted(CyclePhase::Listing))?;
        let remote = self
            .repository
            .list_remote_manifests()
            .await
            .map_err(|e| e.aborted(CyclePhase::Listing))?;

        let (mut deployments, added) = self.diff_engine.compute_diff(&local, &remote).into_deployments();
        for deployment in &mut deployments {
            if let Err(e) = deployment.load_config(self.stack.as_ref()).await {
                error!(file = %deployment.path.display(), error = %e, "Error loading deployment config");
            }
        }
        deployments.extend(added);

        self.registry
            .login_if_credentials_set()
            .await
            .map_err(|e| e.aborted(CyclePhase::RegistryLogin))?;

        self.state.reset();
        let executor = PhaseExecutor::new(self.stack.as_ref(), self.metrics.as_ref());

        for index in select(Phase::Stop, &deployments) {
            let deployment = &mut deployments[index];
            executor.apply(deployment, &mut self.state).await;
            if deployment.error().is_some() {
                error!(
                    file = %deployment.path.display(),
                    "Stop failed, the stack keeps running without a manifest after the pull"
                );
            }
        }

        self.repository
            .pull()
            .await
            .map_err(|e| e.aborted(CyclePhase::RepositoryPull))?;

        for deployment in deployments.iter_mut().filter(|d| d.state != DeploymentState::Removed) {
            if let Err(e) = deployment.load_config(self.stack.as_ref()).await {
                error!(file = %deployment.path.display(), error = %e, "Error loading deployment config");
            }
        }

        for index in select(Phase::Apply, &deployments) {
            executor.apply(&mut deployments[index], &mut self.state).await;
        }

        PhaseExecutor::post_pass(&deployments, &mut self.state);
        Ok(deployments)
    }

    /// Re-applies the retry set on top of the previous counts.
    async fn retry_pass(&mut self) -> Vec<DeploymentOutcome> {
        let pending = std::mem::take(&mut self.retry);
        let executor = PhaseExecutor::new(self.stack.as_ref(), self.metrics.as_ref());
        let mut outcomes = Vec::with_capacity(pending.len());

        for mut deployment in pending {
            match self.state.failed.checked_sub(1) {
                Some(failed) => self.state.failed = failed,
                None => debug!(
                    file = %deployment.path.display(),
                    "Retried deployment has no failure in the current counts"
                ),
            }
            executor.apply(&mut deployment, &mut self.state).await;
            outcomes.push(DeploymentOutcome::from(&deployment));
            if deployment.needs_retry() {
                self.retry.push(deployment);
            }
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use crate::testing::{Call, CallLog, FakeRegistry, FakeRepository, FakeStack, RecordingMetrics};

    fn path(name: &str) -> PathBuf {
        PathBuf::from(format!("/repo/{name}/docker-compose.yml"))
    }

    struct Harness {
        repository: Arc<FakeRepository>,
        stack: Arc<FakeStack>,
        registry: Arc<FakeRegistry>,
        metrics: Arc<RecordingMetrics>,
        log: CallLog,
        reconciler: Reconciler,
    }

    fn harness(repository: FakeRepository, stack: FakeStack) -> Harness {
        let log = CallLog::default();
        let repository = Arc::new(repository.with_log(log.clone()));
        let stack = Arc::new(stack.with_log(log.clone()));
        let registry = Arc::new(FakeRegistry::default().with_log(log.clone()));
        let metrics = Arc::new(RecordingMetrics::default());
        let reconciler = Reconciler::new(
            repository.clone(),
            stack.clone(),
            registry.clone(),
            metrics.clone(),
        );
        Harness {
            repository,
            stack,
            registry,
            metrics,
            log,
            reconciler,
        }
    }

    /// Repository moving from {a, b} to {b', c}.
    fn scenario() -> Harness {
        let repository = FakeRepository::new(vec![path("a"), path("b")], vec![path("b"), path("c")])
            .with_changes(true);
        let stack = FakeStack::new()
            .with_manifest(path("a"), "a1")
            .with_manifest(path("b"), "b1")
            .running(path("a"))
            .running(path("b"));
        let h = harness(repository, stack);

        let stack = h.stack.clone();
        h.repository.on_pull(move || {
            stack.remove_manifest(path("a"));
            stack.set_manifest(path("b"), "b2");
            stack.set_manifest(path("c"), "c1");
        });
        h
    }

    fn position(calls: &[Call], wanted: &Call) -> usize {
        calls
            .iter()
            .position(|c| c == wanted)
            .unwrap_or_else(|| panic!("missing call {wanted:?} in {calls:?}"))
    }

    #[tokio::test]
    async fn test_scenario_counts() {
        let mut h = scenario();
        let report = h.reconciler.run_cycle(TriggerSource::Webhook).await;

        assert_eq!(report.status, CheckStatus::Success);
        assert_eq!(report.mode, CycleMode::FullDiff);
        assert_eq!(
            report.state,
            CycleState {
                stopped: 1,
                updated: 1,
                started: 1,
                ..CycleState::default()
            }
        );
        assert_eq!(h.metrics.states().last(), Some(&report.state));
        assert_eq!(h.metrics.checks(), vec![CheckStatus::Success]);
    }

    #[tokio::test]
    async fn test_ordering_stop_before_pull_before_start() {
        let mut h = scenario();
        h.reconciler.run_cycle(TriggerSource::Timer).await;
        let calls = h.log.calls();

        let stop_a = position(&calls, &Call::Stop(path("a")));
        let pull = position(&calls, &Call::Pull);
        let load_c = position(&calls, &Call::LoadConfig(path("c")));
        let start_c = position(&calls, &Call::Start(path("c")));
        let login = position(&calls, &Call::Login);

        assert!(login < stop_a);
        assert!(stop_a < pull);
        assert!(pull < load_c);
        assert!(load_c < start_c);
    }

    #[tokio::test]
    async fn test_removed_is_never_started_or_pulled() {
        let mut h = scenario();
        h.reconciler.run_cycle(TriggerSource::Timer).await;
        let calls = h.log.calls();

        assert!(!calls.contains(&Call::Start(path("a"))));
        assert!(!calls.contains(&Call::PullImages(path("a"))));
    }

    #[tokio::test]
    async fn test_no_change_cycle_skips_full_diff() {
        let mut h = scenario();
        h.reconciler.run_cycle(TriggerSource::Startup).await;
        h.log.clear();

        let report = h.reconciler.run_cycle(TriggerSource::Timer).await;

        assert_eq!(report.mode, CycleMode::RetryOnly);
        assert_eq!(h.log.calls(), vec![Call::HasRemoteChanges]);
        assert_eq!(report.state.updated, 1);
    }

    #[tokio::test]
    async fn test_first_cycle_is_full_pass_without_changes() {
        let repository = FakeRepository::new(vec![path("a")], vec![path("a")]);
        let stack = FakeStack::new().with_manifest(path("a"), "a1").running(path("a"));
        let mut h = harness(repository, stack);

        let first = h.reconciler.run_cycle(TriggerSource::Startup).await;
        assert_eq!(first.mode, CycleMode::FullDiff);
        assert_eq!(first.state.unchanged, 1);

        let calls = h.log.calls();
        assert!(calls.contains(&Call::PullImages(path("a"))));
        assert!(!calls.contains(&Call::Start(path("a"))));

        let second = h.reconciler.run_cycle(TriggerSource::Timer).await;
        assert_eq!(second.mode, CycleMode::RetryOnly);
        assert_eq!(second.state, first.state);

        let third = h.reconciler.run_cycle(TriggerSource::Timer).await;
        assert_eq!(third.state, first.state);
    }

    #[tokio::test]
    async fn test_retry_convergence() {
        let repository = FakeRepository::new(vec![], vec![path("c")]).with_changes(true);
        let stack = FakeStack::new();
        let mut h = harness(repository, stack);
        let stack = h.stack.clone();
        h.repository.on_pull(move || {
            stack.set_manifest(path("c"), "c1");
            stack.set_failing_pull(path("c"), true);
        });

        let first = h.reconciler.run_cycle(TriggerSource::Webhook).await;
        assert_eq!(first.state.failed, 1);
        assert_eq!(h.reconciler.pending_retries(), vec![path("c")]);
        assert_eq!(
            first.deployments[0].error.as_deref(),
            Some(DeployError::ImagePullBackoff.to_string().as_str())
        );

        let second = h.reconciler.run_cycle(TriggerSource::Timer).await;
        assert_eq!(second.mode, CycleMode::RetryOnly);
        assert_eq!(second.state, first.state);
        assert_eq!(h.reconciler.pending_retries(), vec![path("c")]);

        h.stack.set_failing_pull(path("c"), false);
        let third = h.reconciler.run_cycle(TriggerSource::Timer).await;
        assert_eq!(third.state.failed, 0);
        assert_eq!(third.state.started, 1);
        assert!(h.reconciler.pending_retries().is_empty());
        assert!(h.log.calls().contains(&Call::Start(path("c"))));
    }

    #[tokio::test]
    async fn test_full_diff_replaces_retry_set() {
        let repository = FakeRepository::new(vec![], vec![path("c")]).with_changes(true);
        let mut h = harness(repository, FakeStack::new());
        let stack = h.stack.clone();
        h.repository.on_pull(move || {
            stack.set_manifest(path("c"), "c1");
            stack.set_failing_pull(path("c"), true);
        });
        h.reconciler.run_cycle(TriggerSource::Webhook).await;
        assert_eq!(h.reconciler.pending_retries().len(), 1);

        h.stack.set_failing_pull(path("c"), false);
        h.repository.set_changes(true);
        let report = h.reconciler.run_cycle(TriggerSource::Webhook).await;
        assert_eq!(report.mode, CycleMode::FullDiff);
        assert!(h.reconciler.pending_retries().is_empty());
    }

    #[tokio::test]
    async fn test_controller_is_never_touched() {
        let repository = FakeRepository::new(vec![path("ctl"), path("gone")], vec![path("ctl")])
            .with_changes(true);
        let stack = FakeStack::new()
            .with_labels(path("ctl"), "c1", false, true)
            .with_labels(path("gone"), "g1", false, true)
            .running(path("gone"));
        let mut h = harness(repository, stack);
        let stack = h.stack.clone();
        h.repository.on_pull(move || {
            stack.remove_manifest(path("gone"));
            stack.set_labels(path("ctl"), "c2", false, true);
        });

        let report = h.reconciler.run_cycle(TriggerSource::Webhook).await;
        let calls = h.log.calls();

        for name in ["ctl", "gone"] {
            assert!(!calls.contains(&Call::Start(path(name))));
            assert!(!calls.contains(&Call::Stop(path(name))));
        }
        assert_eq!(report.state.failed, 1);
        assert_eq!(report.state.total(), 1);
    }

    #[tokio::test]
    async fn test_ignored_counted_but_not_applied() {
        let repository = FakeRepository::new(vec![path("a"), path("b")], vec![path("a")])
            .with_changes(true);
        let stack = FakeStack::new()
            .with_labels(path("a"), "a1", true, false)
            .with_labels(path("b"), "b1", true, false)
            .running(path("b"));
        let mut h = harness(repository, stack);

        let report = h.reconciler.run_cycle(TriggerSource::Webhook).await;
        let calls = h.log.calls();

        assert_eq!(report.state.ignored, 2);
        assert!(!calls.contains(&Call::Stop(path("b"))));
        assert!(!calls.contains(&Call::PullImages(path("a"))));
    }

    #[tokio::test]
    async fn test_invalid_manifest_is_counted() {
        let repository = FakeRepository::new(vec![path("bad")], vec![path("bad")]);
        let mut h = harness(repository, FakeStack::new());

        let report = h.reconciler.run_cycle(TriggerSource::Startup).await;

        assert_eq!(report.state.invalid, 1);
        assert!(!h.log.calls().contains(&Call::PullImages(path("bad"))));
        assert!(h.reconciler.pending_retries().is_empty());
    }

    #[tokio::test]
    async fn test_dirty_repository_aborts_cycle() {
        let repository = FakeRepository::new(vec![path("a")], vec![path("a")]).dirty();
        let stack = FakeStack::new().with_manifest(path("a"), "a1");
        let mut h = harness(repository, stack);

        let report = h.reconciler.run_cycle(TriggerSource::Timer).await;

        assert_eq!(report.status, CheckStatus::Error);
        assert_eq!(report.mode, CycleMode::CheckFailed);
        assert!(report.error.is_some());
        assert_eq!(h.log.calls(), vec![Call::HasRemoteChanges]);
        assert_eq!(h.metrics.checks(), vec![CheckStatus::Error]);
        assert!(h.metrics.states().is_empty());

        let board = h.reconciler.status().snapshot();
        assert_eq!(board.cycles, 1);
    }

    #[tokio::test]
    async fn test_failed_check_keeps_first_pass_pending() {
        let repository = FakeRepository::new(vec![path("a")], vec![path("a")]).dirty();
        let stack = FakeStack::new().with_manifest(path("a"), "a1");
        let mut h = harness(repository, stack);

        h.reconciler.run_cycle(TriggerSource::Startup).await;
        h.repository.set_dirty(false);
        let report = h.reconciler.run_cycle(TriggerSource::Timer).await;

        assert_eq!(report.mode, CycleMode::FullDiff);
        assert_eq!(report.state.started, 1);
    }

    #[tokio::test]
    async fn test_login_failure_aborts_before_any_stop() {
        let mut h = scenario();
        h.registry.set_failing(true);

        let report = h.reconciler.run_cycle(TriggerSource::Webhook).await;
        let calls = h.log.calls();

        assert_eq!(report.status, CheckStatus::Error);
        assert!(report.error.as_deref().is_some_and(|e| e.contains("registry login")));
        assert!(!calls.contains(&Call::Stop(path("a"))));
        assert!(!calls.contains(&Call::Pull));
        assert_eq!(
            h.metrics.checks(),
            vec![CheckStatus::Success, CheckStatus::Error]
        );
    }

    #[tokio::test]
    async fn test_pull_failure_aborts_after_stop_phase() {
        let mut h = scenario();
        h.repository.set_failing_pull(true);

        let report = h.reconciler.run_cycle(TriggerSource::Webhook).await;
        let calls = h.log.calls();

        assert_eq!(report.status, CheckStatus::Error);
        assert!(calls.contains(&Call::Stop(path("a"))));
        assert!(!calls.contains(&Call::Start(path("c"))));
        assert_eq!(report.state.stopped, 1);
    }

    #[tokio::test]
    async fn test_failed_stop_still_pulls() {
        let repository = FakeRepository::new(vec![path("a"), path("b")], vec![path("b"), path("c")])
            .with_changes(true);
        let stack = FakeStack::new()
            .with_manifest(path("a"), "a1")
            .with_manifest(path("b"), "b1")
            .running(path("a"))
            .running(path("b"))
            .failing_stop(path("a"));
        let mut h = harness(repository, stack);
        let stack = h.stack.clone();
        h.repository.on_pull(move || stack.set_manifest(path("c"), "c1"));

        let report = h.reconciler.run_cycle(TriggerSource::Webhook).await;

        assert_eq!(report.status, CheckStatus::Success);
        assert_eq!(report.state.failed, 1);
        assert_eq!(report.state.started, 1);
        assert!(h.log.calls().contains(&Call::Pull));
        assert!(h.stack.is_up(path("a")));
        assert!(h.reconciler.pending_retries().is_empty());
    }

    #[tokio::test]
    async fn test_aborted_full_diff_keeps_retry_set() {
        let repository = FakeRepository::new(vec![], vec![path("c")]).with_changes(true);
        let mut h = harness(repository, FakeStack::new());
        let stack = h.stack.clone();
        h.repository.on_pull(move || {
            stack.set_manifest(path("c"), "c1");
            stack.set_failing_pull(path("c"), true);
        });
        h.reconciler.run_cycle(TriggerSource::Webhook).await;
        assert_eq!(h.reconciler.pending_retries(), vec![path("c")]);

        h.repository.set_changes(true);
        h.repository.set_failing_pull(true);
        h.reconciler.run_cycle(TriggerSource::Webhook).await;

        assert_eq!(h.reconciler.pending_retries(), vec![path("c")]);
    }

    #[tokio::test]
    async fn test_retry_after_aborted_full_diff_keeps_counts_sane() {
        let repository = FakeRepository::new(vec![], vec![path("c")]).with_changes(true);
        let mut h = harness(repository, FakeStack::new());
        let stack = h.stack.clone();
        h.repository.on_pull(move || {
            stack.set_manifest(path("c"), "c1");
            stack.set_failing_pull(path("c"), true);
        });
        h.reconciler.run_cycle(TriggerSource::Webhook).await;

        h.repository.set_changes(true);
        h.repository.set_failing_pull(true);
        let aborted = h.reconciler.run_cycle(TriggerSource::Webhook).await;
        assert_eq!(aborted.state.failed, 0);

        h.repository.set_failing_pull(false);
        h.repository.set_changes(false);
        h.stack.set_failing_pull(path("c"), false);
        let report = h.reconciler.run_cycle(TriggerSource::Timer).await;

        assert_eq!(report.mode, CycleMode::RetryOnly);
        assert_eq!(report.state.failed, 0);
        assert_eq!(report.state.started, 1);
        assert!(h.reconciler.pending_retries().is_empty());
    }

    #[tokio::test]
    async fn test_status_board_tracks_cycles() {
        let mut h = scenario();
        let board = h.reconciler.status();

        h.reconciler.run_cycle(TriggerSource::Webhook).await;

        let snapshot = board.snapshot();
        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.state.stopped, 1);
        let last = snapshot.last_check.expect("last check");
        assert_eq!(last.trigger, "webhook");
    }
}
