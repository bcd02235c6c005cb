//! Types for the pool module.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Status of a worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Pool name (e.g., "watermark").
    pub name: String,
    /// Number of tasks currently executing.
    pub active_jobs: usize,
    /// Maximum concurrent tasks.
    pub max_concurrent: usize,
    /// Number of tasks waiting for a worker.
    pub queued_jobs: usize,
    /// Total tasks finished since startup, whatever their outcome.
    pub total_processed: u64,
    /// Total tasks that failed since startup.
    pub total_failed: u64,
}

/// Error type for pool operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// No worker is left to accept the task.
    #[error("Worker pool '{0}' is closed")]
    Closed(String),
}

/// Tracks statistics for a worker pool.
///
/// Shared through an `Arc` so counters can outlive a single pool and
/// accumulate across batches.
#[derive(Debug, Default)]
pub struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    peak_active: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn task_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_dequeued(&self) {
        self.queued.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn task_started(&self) {
        self.queued.fetch_sub(1, Ordering::Relaxed);
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_active.fetch_max(active, Ordering::Relaxed);
    }

    pub(crate) fn task_finished(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.total_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a finished task as failed.
    pub fn record_failure(&self) {
        self.total_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Highest number of simultaneously active tasks observed.
    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::Relaxed) as usize
    }

    pub fn to_status(&self, name: &str, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            queued_jobs: self.queued.load(Ordering::Relaxed) as usize,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}
