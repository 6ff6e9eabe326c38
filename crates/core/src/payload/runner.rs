//! Worker payload runner.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::compute::{ComputeProvider, InstanceId};
use crate::metrics;
use crate::status::{ItemStatus, StatusStore};

use super::task::ScrapeTask;

/// Result of the worker's self-termination request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum SelfTermination {
    /// The provider accepted the request.
    Requested { instance_id: InstanceId },
    /// This process has no instance identity.
    NoIdentity,
    /// The provider rejected the request.
    Failed { error: String },
}

impl SelfTermination {
    pub fn is_requested(&self) -> bool {
        matches!(self, SelfTermination::Requested { .. })
    }
}

/// What a worker run recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadOutcome {
    /// Terminal status written (or attempted) for the item.
    pub status: ItemStatus,
    pub error: Option<String>,
    /// Whether the status write reached the store.
    pub reported: bool,
    pub termination: SelfTermination,
}

/// Runs the scrape task for one item, reports the result and terminates.
pub struct WorkerPayload {
    store: Arc<dyn StatusStore>,
    provider: Arc<dyn ComputeProvider>,
    task: Arc<dyn ScrapeTask>,
}

impl WorkerPayload {
    pub fn new(
        store: Arc<dyn StatusStore>,
        provider: Arc<dyn ComputeProvider>,
        task: Arc<dyn ScrapeTask>,
    ) -> Self {
        Self {
            store,
            provider,
            task,
        }
    }

    /// Run the task once for `(group, item)`.
    ///
    /// Success is reported as COMPLETE, any task error as STOPPED with the
    /// error text. Store failures are logged and do not stop the
    /// self-termination attempt.
    pub async fn run(&self, group: &str, item: &str) -> PayloadOutcome {
        info!(group, item, task = self.task.name(), "Worker started");

        let started = Instant::now();
        let result = self.task.run(group, item).await;
        let elapsed = started.elapsed().as_secs_f64();

        let (status, error) = match result {
            Ok(output) => {
                metrics::TASK_DURATION
                    .with_label_values(&["success"])
                    .observe(elapsed);
                info!(
                    group,
                    item,
                    title = output.title.as_deref().unwrap_or("-"),
                    elapsed_secs = elapsed,
                    "Task completed"
                );
                (ItemStatus::Complete, None)
            }
            Err(e) => {
                metrics::TASK_DURATION
                    .with_label_values(&["failure"])
                    .observe(elapsed);
                error!(group, item, error = %e, elapsed_secs = elapsed, "Task failed");
                (ItemStatus::Stopped, Some(e.to_string()))
            }
        };

        let reported = self.report(group, item, status, error.as_deref());
        let termination = self.terminate_self().await;

        PayloadOutcome {
            status,
            error,
            reported,
            termination,
        }
    }

    fn report(&self, group: &str, item: &str, status: ItemStatus, error: Option<&str>) -> bool {
        metrics::WORKER_REPORTS
            .with_label_values(&[status.as_str()])
            .inc();

        match self.store.set_status(group, item, status, error) {
            Ok(()) => {
                info!(group, item, status = %status, "Recorded item status");
                true
            }
            Err(e) => {
                error!(group, item, status = %status, error = %e, "Failed to record item status");
                false
            }
        }
    }

    async fn terminate_self(&self) -> SelfTermination {
        let Some(instance_id) = self.provider.current_instance_id().await else {
            warn!("No instance identity available, cannot self-terminate");
            metrics::SELF_TERMINATIONS
                .with_label_values(&["worker", "skipped"])
                .inc();
            return SelfTermination::NoIdentity;
        };

        match self
            .provider
            .terminate_instances(std::slice::from_ref(&instance_id))
            .await
        {
            Ok(()) => {
                info!(instance_id = %instance_id, "Requested worker self-termination");
                metrics::SELF_TERMINATIONS
                    .with_label_values(&["worker", "requested"])
                    .inc();
                SelfTermination::Requested { instance_id }
            }
            Err(e) => {
                error!(instance_id = %instance_id, error = %e, "Worker self-termination failed");
                metrics::SELF_TERMINATIONS
                    .with_label_values(&["worker", "failed"])
                    .inc();
                SelfTermination::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}
