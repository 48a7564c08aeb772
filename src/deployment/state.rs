//! Deployment lifecycle states and configuration snapshots.

use serde::{Deserialize, Serialize};

use crate::docker::ManifestSnapshot;
use crate::metrics::Operation;

/// Classification of a deployment within one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    /// Present only at the remote head.
    Added,
    /// Present only at the local head.
    Removed,
    /// Present at both heads with a changed fingerprint.
    Updated,
    /// Present at both heads, fingerprint unchanged.
    #[default]
    Unchanged,
}

impl DeploymentState {
    /// Returns the metrics operation applying this state.
    #[must_use]
    pub const fn operation(self) -> Operation {
        match self {
            Self::Added => Operation::Start,
            Self::Removed => Operation::Remove,
            Self::Updated => Operation::Update,
            Self::Unchanged => Operation::Unchanged,
        }
    }
}

impl std::fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

/// Configuration observed by the last manifest load.
///
/// The default value is the invalid, never-loaded configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentConfig {
    /// Fingerprint of the resolved manifest.
    pub fingerprint: String,
    /// Whether the manifest loaded successfully.
    pub valid: bool,
    /// Set by the ignore label.
    pub ignore: bool,
    /// Set by the controller label.
    pub controller: bool,
}

impl From<ManifestSnapshot> for DeploymentConfig {
    fn from(snapshot: ManifestSnapshot) -> Self {
        Self {
            fingerprint: snapshot.fingerprint,
            valid: true,
            ignore: snapshot.labels.ignore,
            controller: snapshot.labels.controller,
        }
    }
}
