//! Types for the group controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compute::{ComputeError, InstanceId};
use crate::launcher::LaunchError;
use crate::status::{GroupStats, StatusError};

/// Errors that abort a reconciliation cycle or the whole run.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Status store error.
    #[error("status store error: {0}")]
    Store(#[from] StatusError),

    /// Compute provider error.
    #[error("compute provider error: {0}")]
    Compute(#[from] ComputeError),

    /// The group identifier cannot be handed to workers.
    #[error("invalid group: {0}")]
    InvalidGroup(LaunchError),

    /// The orphan timeout cannot be turned into a cutoff time.
    #[error("orphan timeout of {0}s is out of range")]
    OrphanTimeoutOutOfRange(u64),
}

/// How a controller run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerOutcome {
    /// Every item completed and no workers remain.
    Done,
    /// Shutdown was requested before the work drained.
    Cancelled,
}

/// A worker launched during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchedWorker {
    pub item: String,
    pub instance_id: InstanceId,
}

/// A claim or launch that failed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedLaunch {
    pub item: String,
    pub error: String,
}

/// What one reconciliation cycle observed and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub stats: GroupStats,
    /// Active workers for the group at capacity-fill time.
    pub active_workers: usize,
    pub available_slots: usize,
    pub launched: Vec<LaunchedWorker>,
    pub failed: Vec<FailedLaunch>,
    /// Orphaned claims reverted to PENDING.
    pub requeued: Vec<String>,
    /// Consecutive all-complete snapshots after this cycle.
    pub completion_checks: u32,
    /// The run reached its terminal state in this cycle.
    pub done: bool,
}

impl CycleReport {
    pub fn new(stats: GroupStats) -> Self {
        Self {
            stats,
            ..Self::default()
        }
    }
}

/// Snapshot of the controller for status reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub group: String,
    /// Whether the reconciliation loop is running.
    pub running: bool,
    /// Terminal outcome, once reached.
    pub outcome: Option<ControllerOutcome>,
    /// Cycles completed (successful or not).
    pub cycles: u64,
    pub last_stats: Option<GroupStats>,
    pub active_workers: usize,
    pub completion_checks: u32,
    pub launched_total: u64,
    pub failed_launches_total: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ControllerStatus {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_report_new() {
        let stats = GroupStats {
            total: 3,
            pending: 3,
            ..GroupStats::default()
        };
        let report = CycleReport::new(stats);
        assert_eq!(report.stats.total, 3);
        assert!(report.launched.is_empty());
        assert!(!report.done);
    }

    #[test]
    fn test_status_serialization() {
        let status = ControllerStatus::new("UK");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["group"], "UK");
        assert_eq!(json["running"], false);
        assert!(json["outcome"].is_null());
    }

    #[test]
    fn test_error_display() {
        let err = ControllerError::Store(StatusError::Database("disk I/O error".to_string()));
        assert_eq!(err.to_string(), "status store error: database error: disk I/O error");

        let err = ControllerError::Compute(ComputeError::Provider("throttled".to_string()));
        assert_eq!(
            err.to_string(),
            "compute provider error: compute provider error: throttled"
        );
    }
}
