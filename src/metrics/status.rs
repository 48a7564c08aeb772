//! Shared status board read by the HTTP surface.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::cycle::{ActiveDeployments, CycleState};
use super::sink::CheckStatus;

/// The outcome of the last check.
#[derive(Debug, Clone, Serialize)]
pub struct LastCheck {
    /// When the cycle finished.
    pub at: DateTime<Utc>,
    /// Check outcome.
    pub status: CheckStatus,
    /// What triggered the cycle.
    pub trigger: String,
}

/// Point-in-time view of the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Identifier of this daemon process.
    pub instance_id: String,
    /// When the daemon started.
    pub started_at: DateTime<Utc>,
    /// Number of cycles run.
    pub cycles: u64,
    /// Last check, if any cycle ran.
    pub last_check: Option<LastCheck>,
    /// Counts of the last completed cycle.
    pub state: CycleState,
    /// Counts grouped by health.
    pub active: ActiveDeployments,
    /// Manifests waiting for an image pull retry.
    pub pending_retries: Vec<PathBuf>,
}

/// Mutex-guarded status shared between the worker and HTTP handlers.
///
/// Only the reconciliation worker writes to it.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    /// Creates a board for a fresh daemon instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StatusSnapshot {
                instance_id: generate_instance_id(),
                started_at: Utc::now(),
                cycles: 0,
                last_check: None,
                state: CycleState::default(),
                active: ActiveDeployments::default(),
                pending_retries: Vec::new(),
            })),
        }
    }

    /// Returns the instance identifier.
    #[must_use]
    pub fn instance_id(&self) -> String {
        self.lock().instance_id.clone()
    }

    /// Returns a copy of the current status.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().clone()
    }

    /// Records a finished cycle.
    pub fn record_cycle(
        &self,
        status: CheckStatus,
        trigger: &str,
        state: CycleState,
        pending_retries: Vec<PathBuf>,
    ) {
        let mut guard = self.lock();
        guard.cycles += 1;
        guard.last_check = Some(LastCheck {
            at: Utc::now(),
            status,
            trigger: trigger.to_string(),
        });
        guard.state = state;
        guard.active = state.active();
        guard.pending_retries = pending_retries;
    }

    fn lock(&self) -> MutexGuard<'_, StatusSnapshot> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Generates an identifier for this daemon process.
fn generate_instance_id() -> String {
    let hostname = hostname::get().map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());
    let pid = std::process::id();
    let uuid = &Uuid::new_v4().to_string()[..8];

    format!("{hostname}-{pid}-{uuid}")
}
