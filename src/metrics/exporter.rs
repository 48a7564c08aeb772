//! Prometheus implementation of [`MetricsSink`].

use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::{debug, info};

use crate::error::{GitopsError, Result};

use super::cycle::CycleState;
use super::sink::{CheckStatus, MetricsSink, Operation, OperationResult};

const NAMESPACE: &str = "gitops";

/// Prometheus metrics registry for the daemon.
#[derive(Clone)]
pub struct PrometheusMetrics {
    /// Registry holding every collector below.
    registry: Registry,
    /// `gitops_check_total{status}`.
    check_total: IntCounterVec,
    /// `gitops_check_timestamp_seconds{status}`.
    check_timestamp: GaugeVec,
    /// `gitops_deployments_active_total{status}`.
    deployments_active: IntGaugeVec,
    /// `gitops_deployments_operations_total{operation,result}`.
    deployment_operations: IntCounterVec,
}

impl PrometheusMetrics {
    /// Creates and registers all collectors, with every label set at zero.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be created or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let check_total = IntCounterVec::new(
            Opts::new("total", "Total number of GitOps checks by status")
                .namespace(NAMESPACE)
                .subsystem("check"),
            &["status"],
        )
        .map_err(metric_error)?;
        let check_timestamp = GaugeVec::new(
            Opts::new("timestamp_seconds", "Unix timestamp of the last GitOps check by status")
                .namespace(NAMESPACE)
                .subsystem("check"),
            &["status"],
        )
        .map_err(metric_error)?;
        let deployments_active = IntGaugeVec::new(
            Opts::new("active_total", "Number of active deployments by status")
                .namespace(NAMESPACE)
                .subsystem("deployments"),
            &["status"],
        )
        .map_err(metric_error)?;
        let deployment_operations = IntCounterVec::new(
            Opts::new("operations_total", "Total number of deployment operations")
                .namespace(NAMESPACE)
                .subsystem("deployments"),
            &["operation", "result"],
        )
        .map_err(metric_error)?;

        registry.register(Box::new(check_total.clone())).map_err(metric_error)?;
        registry.register(Box::new(check_timestamp.clone())).map_err(metric_error)?;
        registry.register(Box::new(deployments_active.clone())).map_err(metric_error)?;
        registry.register(Box::new(deployment_operations.clone())).map_err(metric_error)?;

        for status in [CheckStatus::Success, CheckStatus::Error] {
            check_total.with_label_values(&[status.as_str()]).reset();
            check_timestamp.with_label_values(&[status.as_str()]).set(0.0);
        }
        for status in ["ok", "removed", "failed", "invalid", "ignored"] {
            deployments_active.with_label_values(&[status]).set(0);
        }
        for operation in Operation::ALL {
            for result in [OperationResult::Success, OperationResult::Error] {
                deployment_operations
                    .with_label_values(&[operation.as_str(), result.as_str()])
                    .reset();
            }
        }

        Ok(Self {
            registry,
            check_total,
            check_timestamp,
            deployments_active,
            deployment_operations,
        })
    }

    /// Renders all metrics in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).map_err(metric_error)?;
        String::from_utf8(buffer).map_err(|e| GitopsError::internal(format!("metrics are not UTF-8: {e}")))
    }

    /// Content type of [`Self::export`].
    #[must_use]
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics")
            .field("families", &self.registry.gather().len())
            .finish_non_exhaustive()
    }
}

impl MetricsSink for PrometheusMetrics {
    fn track_check_status(&self, status: CheckStatus) {
        self.check_total.with_label_values(&[status.as_str()]).inc();
        #[allow(clippy::cast_precision_loss)]
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        self.check_timestamp.with_label_values(&[status.as_str()]).set(now);
    }

    fn track_deployment_operation(&self, operation: Operation, result: OperationResult) {
        debug!(operation = operation.as_str(), result = result.as_str(), "Tracking deployment operation");
        self.deployment_operations
            .with_label_values(&[operation.as_str(), result.as_str()])
            .inc();
    }

    fn track_deployment_state(&self, state: &CycleState) {
        let active = state.active();
        info!(
            ok = active.ok,
            removed = active.removed,
            failed = active.failed,
            invalid = active.invalid,
            ignored = active.ignored,
            "Tracking active deployments"
        );
        for (status, value) in [
            ("ok", active.ok),
            ("removed", active.removed),
            ("failed", active.failed),
            ("invalid", active.invalid),
            ("ignored", active.ignored),
        ] {
            self.deployments_active
                .with_label_values(&[status])
                .set(i64::from(value));
        }
    }
}

fn metric_error(err: prometheus::Error) -> GitopsError {
    GitopsError::internal(format!("metrics error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_sets_start_at_zero() {
        let metrics = PrometheusMetrics::new().expect("metrics");
        let output = metrics.export().expect("export");

        assert!(output.contains("gitops_check_total{status=\"success\"} 0"));
        assert!(output.contains("gitops_check_total{status=\"error\"} 0"));
        assert!(output.contains("gitops_deployments_active_total{status=\"ignored\"} 0"));
        assert!(output.contains(
            "gitops_deployments_operations_total{operation=\"remove\",result=\"error\"} 0"
        ));
    }

    #[test]
    fn test_tracking() {
        let metrics = PrometheusMetrics::new().expect("metrics");
        metrics.track_check_status(CheckStatus::Success);
        metrics.track_deployment_operation(Operation::Start, OperationResult::Success);
        metrics.track_deployment_state(&CycleState {
            unchanged: 2,
            started: 1,
            failed: 1,
            ..CycleState::default()
        });

        let output = metrics.export().expect("export");
        assert!(output.contains("gitops_check_total{status=\"success\"} 1"));
        assert!(output.contains(
            "gitops_deployments_operations_total{operation=\"start\",result=\"success\"} 1"
        ));
        assert!(output.contains("gitops_deployments_active_total{status=\"ok\"} 3"));
        assert!(output.contains("gitops_deployments_active_total{status=\"failed\"} 1"));
        assert!(metrics.content_type().starts_with("text/plain"));
    }
}
