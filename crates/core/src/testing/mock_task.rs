//! Mock scrape task for testing.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::payload::{ScrapeTask, TaskError, TaskOutput};

/// Mock implementation of the ScrapeTask trait.
///
/// Succeeds by default; `fail_with` makes every later run fail.
#[derive(Debug, Default)]
pub struct MockScrapeTask {
    calls: Mutex<Vec<(String, String)>>,
    error: Mutex<Option<TaskError>>,
    delay: Option<Duration>,
}

impl MockScrapeTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before finishing each run.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every subsequent run with this error.
    pub fn fail_with(&self, error: TaskError) {
        if let Ok(mut slot) = self.error.lock() {
            *slot = Some(error);
        }
    }

    /// Recorded `(group, item)` runs.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ScrapeTask for MockScrapeTask {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, group: &str, item: &str) -> Result<TaskOutput, TaskError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((group.to_string(), item.to_string()));
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let error = self.error.lock().ok().and_then(|slot| slot.clone());
        match error {
            Some(error) => Err(error),
            None => Ok(TaskOutput {
                url: format!("mock://{}/{}", group, item),
                http_status: 200,
                title: Some(format!("{} {}", group, item)),
                ..TaskOutput::default()
            }),
        }
    }
}
