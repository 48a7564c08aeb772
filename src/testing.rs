//! In-memory fakes of the runtime, repository and metrics seams.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::docker::{ManifestSnapshot, RegistryAuthenticator, Stack};
use crate::error::{ManifestError, RepoError, Result, StackError};
use crate::git::ManifestRepository;
use crate::manifest::ManifestLabels;
use crate::metrics::{CheckStatus, CycleState, MetricsSink, Operation, OperationResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A call made on one of the fakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LoadConfig(PathBuf),
    IsRunning(PathBuf),
    PullImages(PathBuf),
    Start(PathBuf),
    Stop(PathBuf),
    Login,
    HasRemoteChanges,
    ListLocal,
    ListRemote,
    Pull,
}

/// Ordered call log, shareable between fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        lock(&self.0).push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.0).clone()
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

#[derive(Debug, Default)]
struct StackState {
    manifests: HashMap<PathBuf, ManifestSnapshot>,
    running: HashSet<PathBuf>,
    failing_pull: HashSet<PathBuf>,
    failing_start: HashSet<PathBuf>,
    failing_stop: HashSet<PathBuf>,
}

/// Fake container runtime keyed by manifest path.
#[derive(Debug, Default)]
pub struct FakeStack {
    state: Mutex<StackState>,
    log: CallLog,
}

fn snapshot(fingerprint: &str, ignore: bool, controller: bool) -> ManifestSnapshot {
    ManifestSnapshot {
        fingerprint: fingerprint.to_string(),
        labels: ManifestLabels { ignore, controller },
    }
}

impl FakeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_manifest(self, path: impl Into<PathBuf>, fingerprint: &str) -> Self {
        self.set_manifest(path, fingerprint);
        self
    }

    pub fn with_labels(
        self,
        path: impl Into<PathBuf>,
        fingerprint: &str,
        ignore: bool,
        controller: bool,
    ) -> Self {
        self.set_labels(path, fingerprint, ignore, controller);
        self
    }

    pub fn running(self, path: impl Into<PathBuf>) -> Self {
        self.set_running(path, true);
        self
    }

    pub fn failing_pull(self, path: impl Into<PathBuf>) -> Self {
        self.set_failing_pull(path, true);
        self
    }

    pub fn failing_start(self, path: impl Into<PathBuf>) -> Self {
        lock(&self.state).failing_start.insert(path.into());
        self
    }

    pub fn failing_stop(self, path: impl Into<PathBuf>) -> Self {
        lock(&self.state).failing_stop.insert(path.into());
        self
    }

    pub fn set_manifest(&self, path: impl Into<PathBuf>, fingerprint: &str) {
        self.set_labels(path, fingerprint, false, false);
    }

    pub fn set_labels(
        &self,
        path: impl Into<PathBuf>,
        fingerprint: &str,
        ignore: bool,
        controller: bool,
    ) {
        lock(&self.state)
            .manifests
            .insert(path.into(), snapshot(fingerprint, ignore, controller));
    }

    pub fn remove_manifest(&self, path: impl AsRef<Path>) {
        lock(&self.state).manifests.remove(path.as_ref());
    }

    pub fn set_running(&self, path: impl Into<PathBuf>, running: bool) {
        let path = path.into();
        let mut state = lock(&self.state);
        if running {
            state.running.insert(path);
        } else {
            state.running.remove(&path);
        }
    }

    pub fn set_failing_pull(&self, path: impl Into<PathBuf>, failing: bool) {
        let path = path.into();
        let mut state = lock(&self.state);
        if failing {
            state.failing_pull.insert(path);
        } else {
            state.failing_pull.remove(&path);
        }
    }

    pub fn is_up(&self, path: impl AsRef<Path>) -> bool {
        lock(&self.state).running.contains(path.as_ref())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.calls()
    }

    pub fn clear_calls(&self) {
        self.log.clear();
    }
}

#[async_trait]
impl Stack for FakeStack {
    async fn load_config(&self, path: &Path) -> Result<ManifestSnapshot> {
        self.log.push(Call::LoadConfig(path.to_path_buf()));
        lock(&self.state)
            .manifests
            .get(path)
            .cloned()
            .ok_or_else(|| {
                ManifestError::FileNotFound {
                    path: path.to_path_buf(),
                }
                .into()
            })
    }

    async fn is_running(&self, path: &Path) -> std::result::Result<bool, StackError> {
        self.log.push(Call::IsRunning(path.to_path_buf()));
        Ok(lock(&self.state).running.contains(path))
    }

    async fn pull_images(&self, path: &Path) -> std::result::Result<(), StackError> {
        self.log.push(Call::PullImages(path.to_path_buf()));
        if lock(&self.state).failing_pull.contains(path) {
            return Err(StackError::ImagePull {
                image: String::from("registry.example.com/app:latest"),
                message: String::from("manifest unknown"),
            });
        }
        Ok(())
    }

    async fn start(&self, path: &Path) -> std::result::Result<(), StackError> {
        self.log.push(Call::Start(path.to_path_buf()));
        let mut state = lock(&self.state);
        if state.failing_start.contains(path) {
            return Err(StackError::CommandFailed {
                command: String::from("docker compose up"),
                output: String::from("port is already allocated"),
            });
        }
        state.running.insert(path.to_path_buf());
        Ok(())
    }

    async fn stop(&self, path: &Path) -> std::result::Result<(), StackError> {
        self.log.push(Call::Stop(path.to_path_buf()));
        let mut state = lock(&self.state);
        if state.failing_stop.contains(path) {
            return Err(StackError::CommandFailed {
                command: String::from("docker compose down"),
                output: String::from("container is busy"),
            });
        }
        state.running.remove(path);
        Ok(())
    }
}

type PullHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct RepoState {
    local: Vec<PathBuf>,
    remote: Vec<PathBuf>,
    changes: bool,
    dirty: bool,
    failing_pull: bool,
    on_pull: Option<PullHook>,
}

/// Fake manifest repository with a local and a remote listing.
#[derive(Default)]
pub struct FakeRepository {
    state: Mutex<RepoState>,
    delay: Option<Duration>,
    log: CallLog,
}

impl FakeRepository {
    pub fn new(local: Vec<PathBuf>, remote: Vec<PathBuf>) -> Self {
        Self {
            state: Mutex::new(RepoState {
                local,
                remote,
                ..RepoState::default()
            }),
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_changes(self, changes: bool) -> Self {
        self.set_changes(changes);
        self
    }

    /// Delays every change check.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn dirty(self) -> Self {
        self.set_dirty(true);
        self
    }

    pub fn set_changes(&self, changes: bool) {
        lock(&self.state).changes = changes;
    }

    pub fn set_dirty(&self, dirty: bool) {
        lock(&self.state).dirty = dirty;
    }

    pub fn set_failing_pull(&self, failing: bool) {
        lock(&self.state).failing_pull = failing;
    }

    pub fn set_remote(&self, remote: Vec<PathBuf>) {
        let mut state = lock(&self.state);
        state.remote = remote;
        state.changes = true;
    }

    /// Runs `hook` once, on the next successful pull.
    pub fn on_pull(&self, hook: impl FnOnce() + Send + 'static) {
        lock(&self.state).on_pull = Some(Box::new(hook));
    }
}

#[async_trait]
impl ManifestRepository for FakeRepository {
    async fn list_local_manifests(&self) -> Result<Vec<PathBuf>> {
        self.log.push(Call::ListLocal);
        Ok(lock(&self.state).local.clone())
    }

    async fn list_remote_manifests(&self) -> Result<Vec<PathBuf>> {
        self.log.push(Call::ListRemote);
        Ok(lock(&self.state).remote.clone())
    }

    async fn has_remote_changes(&self) -> Result<bool> {
        self.log.push(Call::HasRemoteChanges);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let state = lock(&self.state);
        if state.dirty {
            return Err(RepoError::DirtyWorktree {
                path: PathBuf::from("/repo"),
            }
            .into());
        }
        Ok(state.changes)
    }

    async fn pull(&self) -> Result<()> {
        self.log.push(Call::Pull);
        let hook = {
            let mut state = lock(&self.state);
            if state.failing_pull {
                return Err(RepoError::Command {
                    command: String::from("pull"),
                    stderr: String::from("Could not resolve host"),
                }
                .into());
            }
            state.local = state.remote.clone();
            state.changes = false;
            state.on_pull.take()
        };
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }
}

/// Fake registry login.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    failing: Mutex<bool>,
    log: CallLog,
}

impl FakeRegistry {
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }
}

#[async_trait]
impl RegistryAuthenticator for FakeRegistry {
    async fn login_if_credentials_set(&self) -> Result<bool> {
        self.log.push(Call::Login);
        if *lock(&self.failing) {
            return Err(StackError::Login {
                registry: String::from("registry.example.com"),
                message: String::from("unauthorized"),
            }
            .into());
        }
        Ok(true)
    }
}

/// Metrics sink that records every call.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    checks: Mutex<Vec<CheckStatus>>,
    operations: Mutex<Vec<(Operation, OperationResult)>>,
    states: Mutex<Vec<CycleState>>,
}

impl RecordingMetrics {
    pub fn checks(&self) -> Vec<CheckStatus> {
        lock(&self.checks).clone()
    }

    pub fn operations(&self) -> Vec<(Operation, OperationResult)> {
        lock(&self.operations).clone()
    }

    pub fn states(&self) -> Vec<CycleState> {
        lock(&self.states).clone()
    }
}

impl MetricsSink for RecordingMetrics {
    fn track_check_status(&self, status: CheckStatus) {
        lock(&self.checks).push(status);
    }

    fn track_deployment_operation(&self, operation: Operation, result: OperationResult) {
        lock(&self.operations).push((operation, result));
    }

    fn track_deployment_state(&self, state: &CycleState) {
        lock(&self.states).push(*state);
    }
}
