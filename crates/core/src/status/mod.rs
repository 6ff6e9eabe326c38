//! Work-item status tracking.
//!
//! Every work item is a `(group, item)` pair with exactly one [`ItemStatus`].
//! The controller claims PENDING items, workers report the terminal status.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteStatusStore;
pub use store::{StatusError, StatusStore};
pub use types::{GroupStats, ItemStatus, WorkItem};
