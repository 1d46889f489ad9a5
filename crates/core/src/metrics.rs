//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Try-on runs (outcome, duration)
//! - Polling (attempts per run, transient failures)
//! - Uploads and remote API calls

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Run Metrics
// =============================================================================

/// Try-on runs total by result.
pub static TRYON_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tryon_runs_total", "Total try-on runs"),
        &["result"], // "success" or a TryOnError kind
    )
    .unwrap()
});

/// Run duration in seconds.
pub static TRYON_RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("tryon_run_duration_seconds", "Duration of try-on runs")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 180.0, 300.0, 600.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Polling Metrics
// =============================================================================

/// Status queries needed per finished poll.
pub static POLL_ATTEMPTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tryon_poll_attempts",
            "Number of status queries per polled task",
        )
        .buckets(vec![1.0, 2.0, 3.0, 5.0, 10.0, 20.0, 30.0]),
        &["result"],
    )
    .unwrap()
});

/// Status queries that got no response and were retried.
pub static POLL_TRANSIENT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tryon_poll_transient_failures_total",
        "Status queries retried after a transport failure",
    )
    .unwrap()
});

// =============================================================================
// Upload / API Metrics
// =============================================================================

/// Uploads total by subject and result.
pub static UPLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tryon_uploads_total", "Total image uploads"),
        &["subject", "result"], // subject: "model", "garment"
    )
    .unwrap()
});

/// Bytes uploaded by subject.
pub static UPLOAD_BYTES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tryon_upload_bytes_total", "Total bytes uploaded"),
        &["subject"],
    )
    .unwrap()
});

/// Remote API requests by operation and status.
pub static API_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tryon_api_requests_total", "Total remote API requests"),
        &["operation", "status"], // status: "success", "transport", "http", "rejected", "invalid"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TRYON_RUNS.clone()),
        Box::new(TRYON_RUN_DURATION.clone()),
        Box::new(POLL_ATTEMPTS.clone()),
        Box::new(POLL_TRANSIENT_FAILURES.clone()),
        Box::new(UPLOADS_TOTAL.clone()),
        Box::new(UPLOAD_BYTES.clone()),
        Box::new(API_REQUESTS.clone()),
    ]
}

/// Label for an API call outcome.
pub(crate) fn api_status_label<T>(result: &Result<T, crate::tryon::ApiError>) -> &'static str {
    use crate::tryon::ApiError;
    match result {
        Ok(_) => "success",
        Err(ApiError::Transport(_)) => "transport",
        Err(ApiError::Http { .. }) => "http",
        Err(ApiError::Rejected { .. }) => "rejected",
        Err(ApiError::InvalidResponse(_)) | Err(ApiError::InvalidRequest(_)) => "invalid",
    }
}
