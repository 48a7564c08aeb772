//! HTTP handlers.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, info};

use crate::metrics::StatusSnapshot;
use crate::scheduler::TriggerSource;

use super::state::AppState;

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether a cycle was queued. `false` when one was already pending.
    pub accepted: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the server answers.
    pub status: String,
    /// Daemon version.
    pub version: String,
    /// Time since start.
    pub uptime: String,
}

/// Queues a cycle. Accepts any method and ignores the body.
pub async fn webhook(State(state): State<AppState>) -> (StatusCode, Json<WebhookResponse>) {
    let accepted = state.trigger.request(TriggerSource::Webhook);
    info!(accepted, "Webhook received");
    (StatusCode::ACCEPTED, Json(WebhookResponse { accepted }))
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: String::from("healthy"),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Status snapshot endpoint.
pub async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot())
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let Some(metrics) = state.metrics.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match metrics.export() {
        Ok(body) => ([(header::CONTENT_TYPE, metrics.content_type())], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
