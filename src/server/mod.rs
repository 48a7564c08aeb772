//! HTTP surface of the daemon.
//!
//! Exposes the webhook trigger, the Prometheus metrics, a health check and
//! the status board.

mod handlers;
mod state;

pub use handlers::{HealthResponse, WebhookResponse};
pub use state::AppState;

use axum::Router;
use axum::routing::{any, get};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::{GitopsError, Result};

/// Builds the router. Optional routes are only mounted when enabled.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status));

    if state.webhook_enabled {
        router = router.route("/webhook", any(handlers::webhook));
    }
    if state.metrics.is_some() {
        router = router.route("/metrics", get(handlers::metrics));
    }

    router.with_state(state)
}

/// HTTP server bound to a listener.
pub struct Server {
    /// Bound listener.
    listener: TcpListener,
    /// Application router.
    router: Router,
}

impl Server {
    /// Binds the listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(address: SocketAddr, state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            listener,
            router: create_router(state),
        })
    }

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until `shutdown` turns true.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(address = %self.local_addr()?, "HTTP server listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
            .map_err(|e| GitopsError::internal(format!("HTTP server failed: {e}")))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM.
///
/// A handler that cannot be installed is logged and never resolves.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
