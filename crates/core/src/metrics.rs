//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Probing (per-item outcomes, durations, batches)
//! - Catch-up queue (flushes, items)
//! - Cleanup (deleted files, skipped runs)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Probe Metrics
// =============================================================================

/// Item probes total by outcome.
pub static PROBES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("strmprobe_probes_total", "Total item probes"),
        &["outcome"], // "success", "failure", "timeout", "cancelled"
    )
    .unwrap()
});

/// Item probe duration in seconds.
pub static PROBE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "strmprobe_probe_duration_seconds",
            "Duration of a single item probe",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Batches total by result.
pub static BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("strmprobe_batches_total", "Total probe batches"),
        &["result"], // "completed", "cancelled"
    )
    .unwrap()
});

/// Items per batch.
pub static BATCH_SIZE: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("strmprobe_batch_size", "Number of items per probe batch")
            .buckets(vec![0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Catch-Up Metrics
// =============================================================================

/// Catch-up flushes total by result.
pub static CATCHUP_FLUSHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("strmprobe_catchup_flushes_total", "Total catch-up flushes"),
        &["result"], // "completed", "cancelled", "panicked"
    )
    .unwrap()
});

/// Items handed to the orchestrator by the catch-up queue.
pub static CATCHUP_ITEMS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "strmprobe_catchup_items_total",
        "Total items forwarded by the catch-up queue",
    )
    .unwrap()
});

// =============================================================================
// Cleanup Metrics
// =============================================================================

/// Pointer files deleted after failed probes.
pub static FILES_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "strmprobe_cleanup_deleted_files_total",
        "Total pointer files deleted after failed probes",
    )
    .unwrap()
});

/// Cleanups skipped because the failure rate exceeded the threshold.
pub static CLEANUPS_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "strmprobe_cleanup_skipped_total",
        "Cleanups skipped because the failure rate was over the threshold",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Probing
        Box::new(PROBES_TOTAL.clone()),
        Box::new(PROBE_DURATION.clone()),
        Box::new(BATCHES_TOTAL.clone()),
        Box::new(BATCH_SIZE.clone()),
        // Catch-up
        Box::new(CATCHUP_FLUSHES.clone()),
        Box::new(CATCHUP_ITEMS.clone()),
        // Cleanup
        Box::new(FILES_DELETED.clone()),
        Box::new(CLEANUPS_SKIPPED.clone()),
    ]
}
