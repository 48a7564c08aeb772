//! Container runtime interfaces.
//!
//! The reconciliation core drives deployments only through these traits, so
//! the compose CLI can be swapped for any other runtime.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{Result, StackError};
use crate::manifest::ManifestLabels;

/// Result of loading a deployment manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSnapshot {
    /// Fingerprint of the resolved manifest and its watch files.
    pub fingerprint: String,
    /// Deployment-wide gitops labels.
    pub labels: ManifestLabels,
}

/// Trait for container stack runtimes.
///
/// Every operation is keyed by the absolute path of a manifest.
#[async_trait]
pub trait Stack: Send + Sync {
    /// Loads and fingerprints a manifest.
    async fn load_config(&self, path: &Path) -> Result<ManifestSnapshot>;

    /// Checks whether the stack has any container.
    async fn is_running(&self, path: &Path) -> std::result::Result<bool, StackError>;

    /// Pulls the images of the stack.
    ///
    /// A failure is reported as [`StackError::ImagePull`].
    async fn pull_images(&self, path: &Path) -> std::result::Result<(), StackError>;

    /// Starts the stack in the background, removing orphaned services.
    async fn start(&self, path: &Path) -> std::result::Result<(), StackError>;

    /// Stops and removes the stack.
    async fn stop(&self, path: &Path) -> std::result::Result<(), StackError>;
}

/// Trait for container registry authentication.
#[async_trait]
pub trait RegistryAuthenticator: Send + Sync {
    /// Logs in to every configured registry.
    ///
    /// Returns `false` when no credentials are configured.
    async fn login_if_credentials_set(&self) -> Result<bool>;
}
