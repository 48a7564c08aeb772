//! Per-cycle outcome counts.

use serde::{Deserialize, Serialize};

/// Outcome counts of one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    /// Deployments left as they were.
    pub unchanged: u32,
    /// Deployments started (new, or healed after drift).
    pub started: u32,
    /// Removed deployments that were stopped.
    pub stopped: u32,
    /// Deployments restarted with a new configuration.
    pub updated: u32,
    /// Deployments whose apply failed.
    pub failed: u32,
    /// Deployments with a manifest that failed to load.
    pub invalid: u32,
    /// Deployments skipped through the ignore label.
    pub ignored: u32,
}

/// Active deployments grouped by health, as exported to the gauge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActiveDeployments {
    /// Running as declared.
    pub ok: u32,
    /// Stopped because their manifest was removed.
    pub removed: u32,
    /// Failed to apply.
    pub failed: u32,
    /// Invalid manifest.
    pub invalid: u32,
    /// Ignored through the label.
    pub ignored: u32,
}

impl CycleState {
    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Groups the counts by health.
    #[must_use]
    pub const fn active(&self) -> ActiveDeployments {
        ActiveDeployments {
            ok: self.unchanged + self.started + self.updated,
            removed: self.stopped,
            failed: self.failed,
            invalid: self.invalid,
            ignored: self.ignored,
        }
    }

    /// Total number of deployments accounted for.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.unchanged
            + self.started
            + self.stopped
            + self.updated
            + self.failed
            + self.invalid
            + self.ignored
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unchanged={} started={} stopped={} updated={} failed={} invalid={} ignored={}",
            self.unchanged,
            self.started,
            self.stopped,
            self.updated,
            self.failed,
            self.invalid,
            self.ignored
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_grouping() {
        let state = CycleState {
            unchanged: 3,
            started: 1,
            stopped: 2,
            updated: 1,
            failed: 1,
            invalid: 0,
            ignored: 4,
        };
        let active = state.active();
        assert_eq!(active.ok, 5);
        assert_eq!(active.removed, 2);
        assert_eq!(active.ignored, 4);
        assert_eq!(state.total(), 12);
    }

    #[test]
    fn test_reset() {
        let mut state = CycleState {
            failed: 2,
            ..CycleState::default()
        };
        state.reset();
        assert_eq!(state, CycleState::default());
    }
}
