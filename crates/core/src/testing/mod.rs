//! Testing utilities and mock implementations.
//!
//! Mocks for the compute provider, the status store and the scrape task,
//! so the controller and the worker payload can be exercised without real
//! infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use scrapefleet_core::testing::{MockComputeProvider, MockScrapeTask};
//!
//! let provider = Arc::new(MockComputeProvider::new().with_own_id("i-controller"));
//! let task = Arc::new(MockScrapeTask::new());
//!
//! // Wire them into a Controller or WorkerPayload...
//! ```

mod mock_compute;
mod mock_status_store;
mod mock_task;

pub use mock_compute::{MockComputeProvider, RecordedLaunch};
pub use mock_status_store::{MockStatusStore, RecordedWrite};
pub use mock_task::MockScrapeTask;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::compute::{InstanceRole, Tags, TAG_GROUP, TAG_ITEM, TAG_PURPOSE};

    /// Tags of a worker launched for `(group, item)`.
    pub fn worker_tags(group: &str, item: &str) -> Tags {
        let mut tags = Tags::new();
        tags.insert(
            TAG_PURPOSE.to_string(),
            InstanceRole::Worker.purpose().to_string(),
        );
        tags.insert(TAG_GROUP.to_string(), group.to_string());
        tags.insert(TAG_ITEM.to_string(), item.to_string());
        tags
    }

    /// Owned item names.
    pub fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }
}
