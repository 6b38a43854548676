//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the offerline server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Pipeline and job state gauges (collected on scrape)
//! - Core orchestrator counters, registered from `offerline_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

use offerline_core::JobRecord;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "offerline_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("offerline_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "offerline_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Job Metrics (collected dynamically)
// =============================================================================

/// Pipelines with a live task in this process.
pub static PIPELINES_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "offerline_pipelines_active",
        "Number of pipelines currently running in this process",
    )
    .unwrap()
});

/// Staleness sweep state (1 = running, 0 = stopped).
pub static STALE_SWEEP_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "offerline_stale_sweep_running",
        "Whether the staleness sweep is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Jobs by current state.
pub static JOBS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("offerline_jobs_by_state", "Current job count by state"),
        &["state"],
    )
    .unwrap()
});

const JOB_STATES: [&str; 4] = ["running", "failed", "completed", "idle"];

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Jobs
    registry
        .register(Box::new(PIPELINES_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(STALE_SWEEP_RUNNING.clone()))
        .unwrap();
    registry.register(Box::new(JOBS_BY_STATE.clone())).unwrap();

    // Core metrics (jobs, generator, companion)
    for metric in offerline_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// State label of a job for the `jobs_by_state` gauge.
pub fn job_state(record: &JobRecord) -> &'static str {
    if record.status.running {
        "running"
    } else if record.status.error.is_some() {
        "failed"
    } else if record.status.progress_percent == 100 {
        "completed"
    } else {
        "idle"
    }
}

/// Collect dynamic metrics from current application state.
///
/// Reads the store directly, so scraping never reconciles stale jobs.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.orchestrator().status().await;
    PIPELINES_ACTIVE.set(status.active_jobs as i64);
    STALE_SWEEP_RUNNING.set(if status.sweep_running { 1 } else { 0 });

    match state.store().list() {
        Ok(records) => {
            for label in JOB_STATES {
                let count = records.iter().filter(|r| job_state(r) == label).count();
                JOBS_BY_STATE.with_label_values(&[label]).set(count as i64);
            }
        }
        Err(e) => warn!("Failed to list jobs for metrics: {}", e),
    }
}

static JOB_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/api/v1/jobs/)[^/]+").unwrap());

/// Normalize a path for metric labels (replace job ids with a placeholder).
pub fn normalize_path(path: &str) -> String {
    JOB_PATH.replace(path, "${1}{id}").into_owned()
}
