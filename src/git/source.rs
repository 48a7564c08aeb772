//! Manifest source interface.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;

/// Trait for the version-controlled source of deployment manifests.
///
/// Manifest paths are absolute paths inside the working copy.
#[async_trait]
pub trait ManifestRepository: Send + Sync {
    /// Lists manifests at the local head of the tracked branch.
    async fn list_local_manifests(&self) -> Result<Vec<PathBuf>>;

    /// Lists manifests at the remote head of the tracked branch.
    async fn list_remote_manifests(&self) -> Result<Vec<PathBuf>>;

    /// Fetches the remote and reports whether its head differs from the
    /// local head.
    ///
    /// Fails when the working copy has uncommitted modifications.
    async fn has_remote_changes(&self) -> Result<bool>;

    /// Brings the working copy up to the remote head.
    async fn pull(&self) -> Result<()>;
}
