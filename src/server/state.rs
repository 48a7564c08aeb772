//! Shared state of the HTTP handlers.

use chrono::{DateTime, Utc};

use crate::metrics::{PrometheusMetrics, StatusBoard};
use crate::scheduler::TriggerHandle;

/// Application state cloned into every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Queue handle for webhook triggers.
    pub trigger: TriggerHandle,
    /// Prometheus registry, when metrics are enabled.
    pub metrics: Option<PrometheusMetrics>,
    /// Daemon status.
    pub status: StatusBoard,
    /// Whether `/webhook` is exposed.
    pub webhook_enabled: bool,
    /// Daemon version.
    pub version: String,
    /// Daemon start time.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Creates the state with webhooks enabled and no metrics.
    #[must_use]
    pub fn new(trigger: TriggerHandle, status: StatusBoard) -> Self {
        Self {
            trigger,
            metrics: None,
            status,
            webhook_enabled: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    /// Exposes `/metrics` from the given registry.
    #[must_use]
    pub fn with_metrics(mut self, metrics: PrometheusMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enables or disables `/webhook`.
    #[must_use]
    pub const fn with_webhook(mut self, enabled: bool) -> Self {
        self.webhook_enabled = enabled;
        self
    }

    /// Returns the uptime as a human readable string.
    #[must_use]
    pub fn uptime(&self) -> String {
        let elapsed = Utc::now() - self.started_at;
        let secs = elapsed.num_seconds().max(0);
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
