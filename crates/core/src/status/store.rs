//! Status store trait and errors.

use thiserror::Error;

use super::{GroupStats, ItemStatus, WorkItem};

/// Error type for status store operations.
#[derive(Debug, Error)]
pub enum StatusError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(String),

    /// A stored row carries a status value outside the known set.
    #[error("item {group}:{item} has unknown status {value:?}")]
    UnknownStatus {
        group: String,
        item: String,
        value: String,
    },

    /// A stored timestamp could not be parsed.
    #[error("item {group}:{item} has invalid last_updated {value:?}")]
    InvalidTimestamp {
        group: String,
        item: String,
        value: String,
    },
}

impl From<rusqlite::Error> for StatusError {
    fn from(e: rusqlite::Error) -> Self {
        StatusError::Database(e.to_string())
    }
}

/// Shared table of work-item statuses, keyed by `(group, item)`.
///
/// Reads always reflect the latest writes; implementations must not cache.
pub trait StatusStore: Send + Sync {
    /// All items of a group, in the store's natural order.
    fn items_by_group(&self, group: &str) -> Result<Vec<WorkItem>, StatusError>;

    /// A single item.
    fn get(&self, group: &str, item: &str) -> Result<Option<WorkItem>, StatusError>;

    /// Overwrite an item's status and stamp `last_updated` with the current time.
    ///
    /// No concurrency control: the last writer wins. When `error_message` is
    /// `None` any previously recorded message is kept.
    fn set_status(
        &self,
        group: &str,
        item: &str,
        status: ItemStatus,
        error_message: Option<&str>,
    ) -> Result<(), StatusError>;

    /// Insert PENDING rows for items that do not exist yet.
    /// Returns the number of rows inserted.
    fn seed_items(&self, group: &str, items: &[String]) -> Result<usize, StatusError>;

    /// Items of a group that are still waiting to be claimed.
    fn pending_items(&self, group: &str) -> Result<Vec<WorkItem>, StatusError> {
        Ok(self
            .items_by_group(group)?
            .into_iter()
            .filter(|item| item.status == ItemStatus::Pending)
            .collect())
    }

    /// Aggregate counts for a group.
    fn group_stats(&self, group: &str) -> Result<GroupStats, StatusError> {
        Ok(GroupStats::from_items(&self.items_by_group(group)?))
    }
}
