//! Group controller implementation.
//!
//! Each cycle reads a fresh status snapshot and a fresh inventory; nothing
//! is carried between cycles except the consecutive-completion counter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::compute::{ComputeProvider, InstanceId, WorkerInstance};
use crate::inventory::WorkerInventory;
use crate::launcher::{validate_param, WorkerLauncher};
use crate::metrics;
use crate::status::{GroupStats, ItemStatus, StatusStore};

use super::config::ControllerConfig;
use super::types::{
    ControllerError, ControllerOutcome, ControllerStatus, CycleReport, FailedLaunch,
    LaunchedWorker,
};

/// Supervises one group until every item is complete and no workers remain.
pub struct Controller {
    group: String,
    config: ControllerConfig,
    store: Arc<dyn StatusStore>,
    provider: Arc<dyn ComputeProvider>,
    launcher: WorkerLauncher,
    inventory: WorkerInventory,

    // Runtime state
    consecutive_complete_checks: u32,
    terminated: bool,
    status: Arc<RwLock<ControllerStatus>>,
}

impl Controller {
    /// Create a controller for `group`.
    pub fn new(
        group: impl Into<String>,
        config: ControllerConfig,
        store: Arc<dyn StatusStore>,
        provider: Arc<dyn ComputeProvider>,
        launcher: WorkerLauncher,
    ) -> Self {
        let group = group.into();
        let inventory = WorkerInventory::new(Arc::clone(&provider));
        let status = Arc::new(RwLock::new(ControllerStatus::new(group.clone())));

        Self {
            group,
            config,
            store,
            provider,
            launcher,
            inventory,
            consecutive_complete_checks: 0,
            terminated: false,
            status,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Current value of the consecutive-completion counter.
    pub fn completion_checks(&self) -> u32 {
        self.consecutive_complete_checks
    }

    /// Shared handle to the status snapshot, updated after every cycle.
    pub fn status_handle(&self) -> Arc<RwLock<ControllerStatus>> {
        Arc::clone(&self.status)
    }

    /// Current status snapshot.
    pub async fn status(&self) -> ControllerStatus {
        self.status.read().await.clone()
    }

    /// Check that the group is usable and both backends answer.
    ///
    /// Called by `run` before the first cycle; any failure here aborts the run.
    pub async fn preflight(&self) -> Result<GroupStats, ControllerError> {
        validate_param("group", &self.group).map_err(ControllerError::InvalidGroup)?;

        let stats = self.store.group_stats(&self.group)?;
        let active = self.inventory.active_count(Some(&self.group)).await?;

        info!(
            group = %self.group,
            total = stats.total,
            pending = stats.pending,
            active_workers = active,
            provider = self.provider.name(),
            "Controller preflight passed"
        );

        if stats.total == 0 {
            warn!(group = %self.group, "Group has no items; it will be treated as complete");
        }

        Ok(stats)
    }

    /// Run reconciliation cycles until the group is done or `shutdown` fires.
    ///
    /// Errors inside a cycle are logged and retried on the next interval;
    /// only preflight failures are returned.
    pub async fn run(
        &mut self,
        shutdown: CancellationToken,
    ) -> Result<ControllerOutcome, ControllerError> {
        if let Err(e) = self.preflight().await {
            error!(group = %self.group, error = %e, "Controller startup failed");
            self.status.write().await.last_error = Some(e.to_string());
            return Err(e);
        }

        self.status.write().await.running = true;

        let interval = Duration::from_millis(self.config.poll_interval_ms);
        info!(
            group = %self.group,
            max_instances = self.config.max_instances,
            poll_interval_ms = self.config.poll_interval_ms,
            completion_confirmations = self.config.completion_confirmations,
            "Controller started"
        );

        let outcome = loop {
            if shutdown.is_cancelled() {
                break ControllerOutcome::Cancelled;
            }

            match self.reconcile().await {
                Ok(report) if report.done => break ControllerOutcome::Done,
                Ok(_) => {}
                Err(e) => {
                    if shutdown.is_cancelled() {
                        break ControllerOutcome::Cancelled;
                    }
                    warn!(
                        group = %self.group,
                        error = %e,
                        "Reconciliation cycle failed, retrying next interval"
                    );
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break ControllerOutcome::Cancelled,
                _ = tokio::time::sleep(interval) => {}
            }
        };

        {
            let mut status = self.status.write().await;
            status.running = false;
            status.outcome = Some(outcome);
        }

        match outcome {
            ControllerOutcome::Done => info!(group = %self.group, "Controller finished"),
            ControllerOutcome::Cancelled => {
                info!(group = %self.group, "Controller stopped by shutdown request")
            }
        }

        Ok(outcome)
    }

    /// Run one reconciliation cycle.
    pub async fn reconcile(&mut self) -> Result<CycleReport, ControllerError> {
        let started = Instant::now();
        let result = self.reconcile_inner().await;
        metrics::CONTROLLER_CYCLE_DURATION.observe(started.elapsed().as_secs_f64());

        let mut status = self.status.write().await;
        status.cycles += 1;
        status.last_cycle_at = Some(Utc::now());
        status.completion_checks = self.consecutive_complete_checks;

        match &result {
            Ok(report) => {
                let label = if report.done { "done" } else { "ok" };
                metrics::CONTROLLER_CYCLES.with_label_values(&[label]).inc();
                metrics::COMPLETION_CHECKS.set(i64::from(self.consecutive_complete_checks));
                metrics::ACTIVE_WORKERS.set(report.active_workers as i64);

                status.last_stats = Some(report.stats);
                status.active_workers = report.active_workers;
                status.launched_total += report.launched.len() as u64;
                status.failed_launches_total += report.failed.len() as u64;
                status.last_error = None;
            }
            Err(e) => {
                metrics::CONTROLLER_CYCLES.with_label_values(&["error"]).inc();
                status.last_error = Some(e.to_string());
            }
        }

        result
    }

    async fn reconcile_inner(&mut self) -> Result<CycleReport, ControllerError> {
        let stats = self.store.group_stats(&self.group)?;
        metrics::record_group_stats(&stats);
        info!(
            group = %self.group,
            total = stats.total,
            pending = stats.pending,
            in_progress = stats.in_progress,
            complete = stats.complete,
            stopped = stats.stopped,
            "Group status"
        );

        let mut report = CycleReport::new(stats);

        // Completion: only a run of consecutive complete snapshots counts.
        if stats.all_complete() {
            self.consecutive_complete_checks += 1;
        } else {
            self.consecutive_complete_checks = 0;
        }

        if self.consecutive_complete_checks >= self.config.completion_confirmations {
            let active = self.inventory.list_active(Some(&self.group)).await?;
            report.active_workers = active.len();

            if active.is_empty() {
                info!(
                    group = %self.group,
                    checks = self.consecutive_complete_checks,
                    "All items complete and no workers remain"
                );
                self.terminate_self().await;
                report.completion_checks = self.consecutive_complete_checks;
                report.done = true;
                return Ok(report);
            }

            info!(
                group = %self.group,
                active_workers = active.len(),
                "All items complete but workers still active, resetting completion counter"
            );
            self.consecutive_complete_checks = 0;
        } else if self.consecutive_complete_checks > 0 {
            debug!(
                group = %self.group,
                checks = self.consecutive_complete_checks,
                required = self.config.completion_confirmations,
                "Group complete, awaiting confirmation"
            );
        }
        report.completion_checks = self.consecutive_complete_checks;

        // Capacity fill.
        let active = self.inventory.list_active(Some(&self.group)).await?;
        report.active_workers = active.len();

        if let Some(timeout_secs) = self.config.orphan_timeout_secs {
            report.requeued = self.requeue_orphans(&active, timeout_secs)?;
        }

        let available = self.config.max_instances.saturating_sub(active.len());
        report.available_slots = available;

        if available == 0 {
            debug!(
                group = %self.group,
                active_workers = active.len(),
                max_instances = self.config.max_instances,
                "No free worker slots"
            );
            return Ok(report);
        }

        let pending = self.store.pending_items(&self.group)?;
        if pending.is_empty() {
            return Ok(report);
        }

        info!(
            group = %self.group,
            available,
            pending = pending.len(),
            "Launching workers"
        );

        for item in pending.into_iter().take(available) {
            match self.claim_and_launch(&item.item).await {
                Ok(instance_id) => report.launched.push(LaunchedWorker {
                    item: item.item,
                    instance_id,
                }),
                Err(error) => report.failed.push(FailedLaunch {
                    item: item.item,
                    error,
                }),
            }
        }

        Ok(report)
    }

    /// Mark the item IN_PROGRESS, then launch its worker.
    ///
    /// The claim is written first so a worker never starts on an item still
    /// marked PENDING. A failed launch puts the item back to PENDING with the
    /// error text; a failed claim skips the launch.
    async fn claim_and_launch(&self, item: &str) -> Result<InstanceId, String> {
        if let Err(e) = self
            .store
            .set_status(&self.group, item, ItemStatus::InProgress, None)
        {
            error!(group = %self.group, item, error = %e, "Failed to claim item, skipping launch");
            metrics::WORKER_LAUNCHES
                .with_label_values(&["claim_failed"])
                .inc();
            return Err(format!("claim failed: {}", e));
        }

        match self.launcher.launch(&self.group, item).await {
            Ok(instance_id) => {
                info!(group = %self.group, item, instance_id = %instance_id, "Worker launched");
                metrics::WORKER_LAUNCHES.with_label_values(&["success"]).inc();
                Ok(instance_id)
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    group = %self.group,
                    item,
                    error = %message,
                    "Worker launch failed, reverting item to PENDING"
                );
                metrics::WORKER_LAUNCHES.with_label_values(&["failed"]).inc();

                if let Err(store_err) = self.store.set_status(
                    &self.group,
                    item,
                    ItemStatus::Pending,
                    Some(&message),
                ) {
                    error!(
                        group = %self.group,
                        item,
                        error = %store_err,
                        "Failed to revert item after launch failure"
                    );
                }
                Err(message)
            }
        }
    }

    /// Put stale IN_PROGRESS items without a live worker back to PENDING.
    fn requeue_orphans(
        &self,
        active: &[WorkerInstance],
        timeout_secs: u64,
    ) -> Result<Vec<String>, ControllerError> {
        let cutoff = i64::try_from(timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|timeout| Utc::now().checked_sub_signed(timeout))
            .ok_or(ControllerError::OrphanTimeoutOutOfRange(timeout_secs))?;
        let mut requeued = Vec::new();

        for item in self.store.items_by_group(&self.group)? {
            if item.status != ItemStatus::InProgress
                || item.last_updated >= cutoff
                || WorkerInventory::has_worker_for(active, &item.item)
            {
                continue;
            }

            warn!(
                group = %self.group,
                item = %item.item,
                last_updated = %item.last_updated,
                "Requeuing item whose worker disappeared"
            );
            self.store.set_status(
                &self.group,
                &item.item,
                ItemStatus::Pending,
                Some("worker disappeared before reporting a result"),
            )?;
            metrics::ORPHANS_REQUEUED.inc();
            requeued.push(item.item);
        }

        Ok(requeued)
    }

    /// Ask the provider to terminate this controller's own instance, once.
    async fn terminate_self(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        let Some(own_id) = self.provider.current_instance_id().await else {
            warn!(
                group = %self.group,
                "No instance identity available, exiting without termination request"
            );
            metrics::SELF_TERMINATIONS
                .with_label_values(&["controller", "skipped"])
                .inc();
            return;
        };

        match self.provider.terminate_instances(&[own_id.clone()]).await {
            Ok(()) => {
                info!(
                    group = %self.group,
                    instance_id = %own_id,
                    "Requested controller self-termination"
                );
                metrics::SELF_TERMINATIONS
                    .with_label_values(&["controller", "requested"])
                    .inc();
            }
            Err(e) => {
                error!(
                    group = %self.group,
                    instance_id = %own_id,
                    error = %e,
                    "Controller self-termination failed"
                );
                metrics::SELF_TERMINATIONS
                    .with_label_values(&["controller", "failed"])
                    .inc();
            }
        }
    }
}
