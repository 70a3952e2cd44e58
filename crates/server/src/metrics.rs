//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the strmprobe server:
//! - HTTP request metrics (latency, counts)
//! - Probe task and catch-up queue status (collected dynamically)
//! - Library size (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

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
            "strmprobe_http_request_duration_seconds",
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
        Opts::new("strmprobe_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "strmprobe_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Task Metrics (collected dynamically)
// =============================================================================

/// Probe task running state (1 = running, 0 = idle).
pub static TASK_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "strmprobe_task_running",
        "Whether the probe task is running (1) or idle (0)",
    )
    .unwrap()
});

/// Progress of the current (or last) probe task run.
pub static TASK_PROGRESS: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new(
        "strmprobe_task_progress_percent",
        "Progress of the current or last probe task run",
    )
    .unwrap()
});

// =============================================================================
// Catch-Up and Library Metrics (collected dynamically)
// =============================================================================

/// Items waiting in the catch-up queue.
pub static CATCHUP_PENDING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "strmprobe_catchup_pending_items",
        "Items waiting for the next catch-up flush",
    )
    .unwrap()
});

/// Indexed library items.
pub static LIBRARY_ITEMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("strmprobe_library_items", "Number of indexed library items").unwrap()
});

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

    // Task
    registry.register(Box::new(TASK_RUNNING.clone())).unwrap();
    registry.register(Box::new(TASK_PROGRESS.clone())).unwrap();

    // Catch-up and library
    registry
        .register(Box::new(CATCHUP_PENDING.clone()))
        .unwrap();
    registry.register(Box::new(LIBRARY_ITEMS.clone())).unwrap();

    // Core metrics (probes, batches, catch-up, cleanup)
    for metric in strmprobe_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current values
/// from the task runner, the catch-up queue and the library store.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let task = state.runner().status();
    TASK_RUNNING.set(i64::from(task.running));
    TASK_PROGRESS.set(task.progress_percent);

    CATCHUP_PENDING.set(state.catch_up().status().pending_items as i64);
    LIBRARY_ITEMS.set(state.store().len() as i64);
}

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_REGEX.replace_all(path, "{id}");
    let result = NUMERIC_REGEX.replace_all(&result, "/{id}$1");
    result.to_string()
}
