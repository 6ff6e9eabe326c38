//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Controller (reconciliation cycles, launches, completion checks)
//! - Worker payload (terminal status reports)

use once_cell::sync::Lazy;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
};

use crate::status::GroupStats;

// =============================================================================
// Controller - Reconciliation Metrics
// =============================================================================

/// Reconciliation cycles by result.
pub static CONTROLLER_CYCLES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scrapefleet_controller_cycles_total",
            "Total reconciliation cycles",
        ),
        &["result"], // "ok", "error", "done"
    )
    .unwrap()
});

/// Reconciliation cycle duration in seconds.
pub static CONTROLLER_CYCLE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "scrapefleet_controller_cycle_duration_seconds",
            "Duration of one reconciliation cycle",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
    )
    .unwrap()
});

/// Consecutive all-complete snapshots observed so far.
pub static COMPLETION_CHECKS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scrapefleet_controller_completion_checks",
        "Consecutive reconciliation cycles that saw every item complete",
    )
    .unwrap()
});

/// Active workers seen by the last cycle.
pub static ACTIVE_WORKERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scrapefleet_active_workers",
        "Pending or running workers for the controlled group",
    )
    .unwrap()
});

/// Items per status in the controlled group.
pub static ITEMS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("scrapefleet_items", "Work items by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Controller - Launch Metrics
// =============================================================================

/// Worker launches by result.
pub static WORKER_LAUNCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scrapefleet_worker_launches_total", "Total worker launches"),
        &["result"], // "success", "failed", "claim_failed"
    )
    .unwrap()
});

/// Claims reverted to PENDING because their worker disappeared.
pub static ORPHANS_REQUEUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "scrapefleet_orphans_requeued_total",
        "IN_PROGRESS items requeued after their worker vanished",
    )
    .unwrap()
});

/// Self-termination requests by result.
pub static SELF_TERMINATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scrapefleet_self_terminations_total",
            "Self-termination requests issued by controllers and workers",
        ),
        // role: "controller", "worker"; result: "requested", "failed", "skipped"
        &["role", "result"],
    )
    .unwrap()
});

// =============================================================================
// Worker Payload Metrics
// =============================================================================

/// Terminal statuses reported by workers.
pub static WORKER_REPORTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scrapefleet_worker_reports_total",
            "Terminal statuses reported by workers",
        ),
        &["status"], // "COMPLETE", "STOPPED"
    )
    .unwrap()
});

/// Scrape task duration in seconds.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scrapefleet_task_duration_seconds",
            "Duration of the scrape task run by a worker",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Helpers
// =============================================================================

/// Publish a group snapshot on the per-status gauge.
pub fn record_group_stats(stats: &GroupStats) {
    ITEMS_BY_STATUS
        .with_label_values(&["PENDING"])
        .set(stats.pending as i64);
    ITEMS_BY_STATUS
        .with_label_values(&["IN_PROGRESS"])
        .set(stats.in_progress as i64);
    ITEMS_BY_STATUS
        .with_label_values(&["COMPLETE"])
        .set(stats.complete as i64);
    ITEMS_BY_STATUS
        .with_label_values(&["STOPPED"])
        .set(stats.stopped as i64);
}

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Controller
        Box::new(CONTROLLER_CYCLES.clone()),
        Box::new(CONTROLLER_CYCLE_DURATION.clone()),
        Box::new(COMPLETION_CHECKS.clone()),
        Box::new(ACTIVE_WORKERS.clone()),
        Box::new(ITEMS_BY_STATUS.clone()),
        Box::new(WORKER_LAUNCHES.clone()),
        Box::new(ORPHANS_REQUEUED.clone()),
        Box::new(SELF_TERMINATIONS.clone()),
        // Worker
        Box::new(WORKER_REPORTS.clone()),
        Box::new(TASK_DURATION.clone()),
    ]
}
