//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job lifecycle (created, completed, failed, retried, stale)
//! - The external generator
//! - Companion notifications

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Job lifecycle
// =============================================================================

/// Jobs created total.
pub static JOBS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("offerline_jobs_created_total", "Total jobs created").unwrap()
});

/// Pipelines that ran to completion.
pub static JOBS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "offerline_jobs_completed_total",
        "Total pipelines completed successfully",
    )
    .unwrap()
});

/// Pipelines that failed, by reason.
pub static JOBS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("offerline_jobs_failed_total", "Total pipelines that failed"),
        &["reason"], // "generator", "artifact_missing", "store", "stale"
    )
    .unwrap()
});

/// Running jobs failed by the staleness monitor.
pub static STALE_JOBS_DETECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "offerline_stale_jobs_detected_total",
        "Total running jobs failed for not updating in time",
    )
    .unwrap()
});

/// Manual retries accepted.
pub static JOB_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("offerline_job_retries_total", "Total manual retries").unwrap()
});

// =============================================================================
// External processes
// =============================================================================

/// Generator run duration in seconds.
pub static GENERATOR_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "offerline_generator_duration_seconds",
            "Duration of generator runs",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 180.0, 300.0, 600.0]),
        &["result"], // "success" or a GeneratorError kind
    )
    .unwrap()
});

/// Companion notifications by result.
pub static COMPANION_NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "offerline_companion_notifications_total",
            "Companion notifications by result",
        ),
        &["result"], // "spawned", "skipped", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_CREATED.clone()),
        Box::new(JOBS_COMPLETED.clone()),
        Box::new(JOBS_FAILED.clone()),
        Box::new(STALE_JOBS_DETECTED.clone()),
        Box::new(JOB_RETRIES.clone()),
        Box::new(GENERATOR_DURATION.clone()),
        Box::new(COMPANION_NOTIFICATIONS_TOTAL.clone()),
    ]
}
