//! Work item types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of a single work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// Seeded, not yet claimed by the controller.
    Pending,
    /// Claimed by the controller, a worker is (or should be) running.
    InProgress,
    /// Worker reported success.
    Complete,
    /// Worker reported failure.
    Stopped,
}

impl ItemStatus {
    /// Wire representation stored in the status table.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::InProgress => "IN_PROGRESS",
            ItemStatus::Complete => "COMPLETE",
            ItemStatus::Stopped => "STOPPED",
        }
    }

    /// Whether a worker has reported this status as its final word.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Complete | ItemStatus::Stopped)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored status string is not one of the four known values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown item status: {:?}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ItemStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ItemStatus::Pending),
            "IN_PROGRESS" => Ok(ItemStatus::InProgress),
            "COMPLETE" => Ok(ItemStatus::Complete),
            "STOPPED" => Ok(ItemStatus::Stopped),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A single unit of work, keyed by `(group, item)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Group the item belongs to (one controller per group).
    pub group: String,
    /// Item identifier within the group.
    pub item: String,
    /// Current status.
    pub status: ItemStatus,
    /// When the status was last written.
    pub last_updated: DateTime<Utc>,
    /// Last recorded error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Aggregate counts for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub complete: usize,
    pub stopped: usize,
}

impl GroupStats {
    /// Count items by status.
    pub fn from_items(items: &[WorkItem]) -> Self {
        let mut stats = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in items {
            match item.status {
                ItemStatus::Pending => stats.pending += 1,
                ItemStatus::InProgress => stats.in_progress += 1,
                ItemStatus::Complete => stats.complete += 1,
                ItemStatus::Stopped => stats.stopped += 1,
            }
        }
        stats
    }

    /// True when every item reported success. An empty group counts as complete.
    pub fn all_complete(&self) -> bool {
        self.complete == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, status: ItemStatus) -> WorkItem {
        WorkItem {
            group: "UK".to_string(),
            item: name.to_string(),
            status,
            last_updated: Utc::now(),
            error_message: None,
        }
    }

    #[test]
    fn test_status_wire_format() {
        for status in [
            ItemStatus::Pending,
            ItemStatus::InProgress,
            ItemStatus::Complete,
            ItemStatus::Stopped,
        ] {
            assert_eq!(status.as_str().parse::<ItemStatus>().unwrap(), status);
        }
        assert_eq!(ItemStatus::InProgress.to_string(), "IN_PROGRESS");
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = "RUNNING".parse::<ItemStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("RUNNING".to_string()));
        assert!("pending".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_wire_format() {
        let json = serde_json::to_string(&ItemStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ItemStatus::Pending.is_terminal());
        assert!(!ItemStatus::InProgress.is_terminal());
        assert!(ItemStatus::Complete.is_terminal());
        assert!(ItemStatus::Stopped.is_terminal());
    }

    #[test]
    fn test_group_stats() {
        let items = vec![
            item("London", ItemStatus::Pending),
            item("Leeds", ItemStatus::InProgress),
            item("York", ItemStatus::Complete),
            item("Bath", ItemStatus::Stopped),
            item("Hull", ItemStatus::Complete),
        ];
        let stats = GroupStats::from_items(&items);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.complete, 2);
        assert_eq!(stats.stopped, 1);
        assert!(!stats.all_complete());
    }

    #[test]
    fn test_all_complete() {
        let items = vec![
            item("Paris", ItemStatus::Complete),
            item("Lyon", ItemStatus::Complete),
        ];
        assert!(GroupStats::from_items(&items).all_complete());
        assert!(GroupStats::default().all_complete());
    }

    #[test]
    fn test_stopped_item_blocks_completion() {
        let items = vec![
            item("Paris", ItemStatus::Complete),
            item("Lyon", ItemStatus::Stopped),
        ];
        assert!(!GroupStats::from_items(&items).all_complete());
    }
}
