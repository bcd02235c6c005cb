//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Batches (submissions, size, archive bundling)
//! - Jobs (outcomes, retries)
//! - Transcoder invocations
//! - Scratch storage cleanup

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batches total by result.
pub static BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("watermarker_batches_total", "Total batch submissions"),
        &["result"], // "succeeded", "partial", "failed", "rejected", "error"
    )
    .unwrap()
});

/// Videos per batch.
pub static BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("watermarker_batch_size", "Number of videos per batch")
            .buckets(vec![1.0, 2.0, 3.0, 5.0, 10.0, 20.0, 50.0]),
    )
    .unwrap()
});

/// Batch duration in seconds, from validation to release.
pub static BATCH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "watermarker_batch_duration_seconds",
            "Duration of batch processing",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
    )
    .unwrap()
});

/// Archive bundling total by result.
pub static ARCHIVES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("watermarker_archives_total", "Total archives bundled"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs total by result and error kind.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("watermarker_jobs_total", "Total watermark jobs"),
        &["result", "kind"], // result: "success", "failed"; kind: error kind or "none"
    )
    .unwrap()
});

/// Retry attempts total.
pub static RETRY_ATTEMPTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "watermarker_retry_attempts_total",
        "Total transcode retry attempts",
    )
    .unwrap()
});

// =============================================================================
// Transcoder Metrics
// =============================================================================

/// Transcode duration in seconds.
pub static TRANSCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "watermarker_transcode_duration_seconds",
            "Duration of transcoder invocations",
        )
        .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Scratch Metrics
// =============================================================================

/// Scratch release failures total.
pub static SCRATCH_RELEASE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "watermarker_scratch_release_failures_total",
        "Total scratch paths that could not be removed",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Batches
        Box::new(BATCHES_TOTAL.clone()),
        Box::new(BATCH_SIZE.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(ARCHIVES_TOTAL.clone()),
        // Jobs
        Box::new(JOBS_TOTAL.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
        // Transcoder
        Box::new(TRANSCODE_DURATION.clone()),
        // Scratch
        Box::new(SCRATCH_RELEASE_FAILURES.clone()),
    ]
}
