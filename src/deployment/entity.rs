//! The deployment entity.
//!
//! A [`Deployment`] is built fresh every cycle for one manifest path. It is
//! classified by the reconciler, loads its configuration through a [`Stack`],
//! and applies the transition its state calls for.

use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::docker::Stack;
use crate::error::{DeployError, Result};
use crate::manifest::ManifestHasher;

use super::state::{DeploymentConfig, DeploymentState};

/// One compose stack tracked by the daemon.
#[derive(Debug, Clone)]
pub struct Deployment {
    /// Absolute manifest path, unique within a cycle.
    pub path: PathBuf,
    /// Classification for the current cycle.
    pub state: DeploymentState,
    /// Configuration from the last load.
    config: DeploymentConfig,
    /// Error of the last apply.
    error: Option<DeployError>,
}

impl Deployment {
    /// Creates an unchanged deployment with no loaded configuration.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: DeploymentState::Unchanged,
            config: DeploymentConfig::default(),
            error: None,
        }
    }

    /// Sets the classification.
    #[must_use]
    pub const fn with_state(mut self, state: DeploymentState) -> Self {
        self.state = state;
        self
    }

    /// Returns the manifest path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration from the last load.
    #[must_use]
    pub const fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    /// Returns the error of the last apply.
    #[must_use]
    pub const fn error(&self) -> Option<&DeployError> {
        self.error.as_ref()
    }

    /// Returns true if the ignore label is set.
    #[must_use]
    pub const fn is_ignored(&self) -> bool {
        self.config.ignore
    }

    /// Returns true if the controller label is set.
    #[must_use]
    pub const fn is_controller(&self) -> bool {
        self.config.controller
    }

    /// Returns true if the last apply failed with a retryable error.
    #[must_use]
    pub fn needs_retry(&self) -> bool {
        self.error.as_ref().is_some_and(DeployError::is_retryable)
    }

    /// Loads the manifest and refreshes the configuration.
    ///
    /// The previous configuration is discarded first, so a failed load leaves
    /// the deployment invalid. When a valid configuration was loaded before
    /// and the fingerprint differs, the deployment becomes `Updated`.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded.
    pub async fn load_config(&mut self, stack: &dyn Stack) -> Result<()> {
        let previous = std::mem::take(&mut self.config);

        let snapshot = stack.load_config(&self.path).await?;
        self.config = DeploymentConfig::from(snapshot);

        if previous.valid && previous.fingerprint != self.config.fingerprint {
            debug!(
                file = %self.path.display(),
                from = %ManifestHasher::short_hash(&previous.fingerprint),
                to = %ManifestHasher::short_hash(&self.config.fingerprint),
                "Fingerprint changed"
            );
            self.state = DeploymentState::Updated;
        }

        Ok(())
    }

    /// Applies the transition for the current state.
    ///
    /// Returns whether a state-changing action happened on the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidManifest`] without touching the runtime
    /// when the configuration is invalid, [`DeployError::ImagePullBackoff`]
    /// when an image pull fails, and [`DeployError::Failed`] otherwise.
    pub async fn apply(&mut self, stack: &dyn Stack) -> std::result::Result<bool, DeployError> {
        self.error = None;

        let result = self.apply_inner(stack).await;
        if let Err(e) = &result {
            self.error = Some(e.clone());
        }
        result
    }

    async fn apply_inner(&self, stack: &dyn Stack) -> std::result::Result<bool, DeployError> {
        if !self.config.valid {
            return Err(DeployError::InvalidManifest);
        }
        if self.config.ignore || self.config.controller {
            return Ok(false);
        }

        match self.state {
            DeploymentState::Added => {
                self.pull_images(stack).await?;
                stack.start(&self.path).await?;
                Ok(true)
            }
            DeploymentState::Removed => self.ensure_stopped(stack).await,
            DeploymentState::Updated => {
                self.pull_images(stack).await?;
                self.ensure_stopped(stack).await?;
                self.ensure_running(stack).await
            }
            DeploymentState::Unchanged => {
                self.pull_images(stack).await?;
                self.ensure_running(stack).await
            }
        }
    }

    async fn pull_images(&self, stack: &dyn Stack) -> std::result::Result<(), DeployError> {
        stack.pull_images(&self.path).await.map_err(|e| {
            error!(file = %self.path.display(), error = %e, "Failed to pull images");
            DeployError::from(e)
        })
    }

    /// Stops the stack if it is running. Returns whether it was stopped.
    async fn ensure_stopped(&self, stack: &dyn Stack) -> std::result::Result<bool, DeployError> {
        if stack.is_running(&self.path).await? {
            stack.stop(&self.path).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Starts the stack unless it is running. Returns whether it was started.
    async fn ensure_running(&self, stack: &dyn Stack) -> std::result::Result<bool, DeployError> {
        if stack.is_running(&self.path).await? {
            Ok(false)
        } else {
            stack.start(&self.path).await?;
            Ok(true)
        }
    }
}
