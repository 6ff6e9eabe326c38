//! Mock status store for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::status::{ItemStatus, SqliteStatusStore, StatusError, StatusStore, WorkItem};

/// A recorded set_status call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub group: String,
    pub item: String,
    pub status: ItemStatus,
    pub error_message: Option<String>,
}

/// Status store backed by an in-memory SQLite database with error injection.
///
/// Reads and writes can be made to fail independently to exercise the
/// error paths of the controller and the worker payload.
pub struct MockStatusStore {
    inner: SqliteStatusStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: Mutex<Vec<RecordedWrite>>,
}

impl Default for MockStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStatusStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self {
            inner: SqliteStatusStore::in_memory().expect("in-memory SQLite store"),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Make every read fail until reset.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail until reset.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful set_status calls, in order.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    fn check_read(&self) -> Result<(), StatusError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StatusError::Database("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StatusError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StatusError::Database("injected write failure".to_string()));
        }
        Ok(())
    }
}

impl StatusStore for MockStatusStore {
    fn items_by_group(&self, group: &str) -> Result<Vec<WorkItem>, StatusError> {
        self.check_read()?;
        self.inner.items_by_group(group)
    }

    fn get(&self, group: &str, item: &str) -> Result<Option<WorkItem>, StatusError> {
        self.check_read()?;
        self.inner.get(group, item)
    }

    fn set_status(
        &self,
        group: &str,
        item: &str,
        status: ItemStatus,
        error_message: Option<&str>,
    ) -> Result<(), StatusError> {
        self.check_write()?;
        self.inner.set_status(group, item, status, error_message)?;
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(RecordedWrite {
                group: group.to_string(),
                item: item.to_string(),
                status,
                error_message: error_message.map(str::to_string),
            });
        }
        Ok(())
    }

    fn seed_items(&self, group: &str, items: &[String]) -> Result<usize, StatusError> {
        self.check_write()?;
        self.inner.seed_items(group, items)
    }
}
