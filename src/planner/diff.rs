//! Diff of the manifest listings at the local and remote heads.

use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

use crate::deployment::{Deployment, DeploymentState};

/// Engine for classifying manifest paths from two listings.
#[derive(Debug, Default)]
pub struct DiffEngine;

/// Classification of one manifest path by set membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestDiff {
    /// Manifest path.
    pub path: PathBuf,
    /// Membership class. `Unchanged` until fingerprints are compared.
    pub state: DeploymentState,
}

/// Complete diff result.
#[derive(Debug, Default, Serialize)]
pub struct DiffResult {
    /// All manifest diffs: local paths first, then remote-only paths.
    pub diffs: Vec<ManifestDiff>,
    /// Number of remote-only paths.
    pub added: usize,
    /// Number of local-only paths.
    pub removed: usize,
    /// Number of paths present at both heads.
    pub retained: usize,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classifies every path of both listings.
    ///
    /// Duplicate paths within a listing are collapsed.
    #[must_use]
    pub fn compute_diff(&self, local: &[PathBuf], remote: &[PathBuf]) -> DiffResult {
        let local_set: HashSet<&PathBuf> = local.iter().collect();
        let remote_set: HashSet<&PathBuf> = remote.iter().collect();
        let mut seen = HashSet::new();
        let mut result = DiffResult::default();

        for path in local {
            if !seen.insert(path) {
                continue;
            }
            let state = if remote_set.contains(path) {
                result.retained += 1;
                DeploymentState::Unchanged
            } else {
                result.removed += 1;
                DeploymentState::Removed
            };
            result.diffs.push(ManifestDiff {
                path: path.clone(),
                state,
            });
        }

        for path in remote {
            if local_set.contains(path) || !seen.insert(path) {
                continue;
            }
            result.added += 1;
            result.diffs.push(ManifestDiff {
                path: path.clone(),
                state: DeploymentState::Added,
            });
        }

        debug!(
            added = result.added,
            removed = result.removed,
            retained = result.retained,
            "Computed manifest diff"
        );
        result
    }
}

impl DiffResult {
    /// Splits the diff into deployments to load before the pull and
    /// deployments that only exist after it.
    #[must_use]
    pub fn into_deployments(self) -> (Vec<Deployment>, Vec<Deployment>) {
        self.diffs
            .into_iter()
            .map(|diff| Deployment::new(diff.path).with_state(diff.state))
            .partition(|d| d.state != DeploymentState::Added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| PathBuf::from(format!("/repo/{n}/docker-compose.yml")))
            .collect()
    }

    #[test]
    fn test_membership_classification() {
        let engine = DiffEngine::new();
        let diff = engine.compute_diff(&paths(&["a", "b"]), &paths(&["b", "c"]));

        let states: Vec<_> = diff.diffs.iter().map(|d| d.state).collect();
        assert_eq!(
            states,
            vec![
                DeploymentState::Removed,
                DeploymentState::Unchanged,
                DeploymentState::Added
            ]
        );
        assert_eq!((diff.added, diff.removed, diff.retained), (1, 1, 1));
    }

    #[test]
    fn test_identical_listings() {
        let engine = DiffEngine::new();
        let diff = engine.compute_diff(&paths(&["a", "b"]), &paths(&["a", "b"]));
        assert_eq!((diff.added, diff.removed, diff.retained), (0, 0, 2));
    }

    #[test]
    fn test_one_entry_per_path() {
        let engine = DiffEngine::new();
        let diff = engine.compute_diff(&paths(&["a", "a"]), &paths(&["c", "c"]));
        assert_eq!(diff.diffs.len(), 2);
    }

    #[test]
    fn test_into_deployments_splits_added() {
        let engine = DiffEngine::new();
        let (existing, added) = engine
            .compute_diff(&paths(&["a", "b"]), &paths(&["b", "c"]))
            .into_deployments();
        assert_eq!(existing.len(), 2);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].state, DeploymentState::Added);
    }
}
