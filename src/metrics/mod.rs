//! Cycle accounting and metrics export.
//!
//! This module provides:
//! - [`CycleState`] counts for one reconciliation cycle
//! - The [`MetricsSink`] interface and its Prometheus implementation
//! - The [`StatusBoard`] shared with the HTTP surface

mod cycle;
mod exporter;
mod sink;
mod status;

pub use cycle::{ActiveDeployments, CycleState};
pub use exporter::PrometheusMetrics;
pub use sink::{CheckStatus, MetricsSink, Operation, OperationResult};
pub use status::{LastCheck, StatusBoard, StatusSnapshot};
