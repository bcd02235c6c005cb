//! Batch execution.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bundle::Bundler;
use crate::metrics;
use crate::pool::{PoolStats, PoolStatus, WorkerPool};
use crate::scratch::{BatchScratch, ScratchManager};
use crate::transcoder::{OverlayRequest, Transcoder, DEFAULT_MARGIN};

use super::config::{EngineConfig, RetryConfig};
use super::error::{EngineError, JobError, ValidationError};
use super::types::{BatchRequest, BatchResult, Download, Job, JobOutcome, JobResult};

/// Name reported in pool status and logs.
pub const POOL_NAME: &str = "watermark";

/// Runs batches of watermark jobs.
///
/// Each `submit` gets a fresh worker pool, but every pool draws from one
/// engine-wide set of `workers` permits: concurrent batches never run more
/// than `workers` jobs between them. Statistics accumulate across batches.
pub struct JobEngine {
    config: EngineConfig,
    transcoder: Arc<dyn Transcoder>,
    scratch: ScratchManager,
    bundler: Bundler,
    margin: u32,
    stats: Arc<PoolStats>,
    permits: Arc<Semaphore>,
}

/// Everything a job needs besides itself.
struct JobContext {
    batch_id: String,
    transcoder: Arc<dyn Transcoder>,
    batch: Arc<BatchScratch>,
    retry: RetryConfig,
    margin: u32,
}

impl JobEngine {
    pub fn new(config: EngineConfig, transcoder: Arc<dyn Transcoder>) -> Self {
        let scratch = ScratchManager::new(config.scratch_dir.clone());
        let permits = Arc::new(Semaphore::new(config.workers.max(1)));
        let bundler = if config.compress_archive {
            Bundler::new()
        } else {
            Bundler::new().stored()
        };
        Self {
            config,
            transcoder,
            scratch,
            bundler,
            margin: DEFAULT_MARGIN,
            stats: Arc::new(PoolStats::new()),
            permits,
        }
    }

    /// Sets the overlay margin in pixels.
    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    pub fn margin(&self) -> u32 {
        self.margin
    }

    /// Cumulative pool statistics across all batches.
    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(POOL_NAME, self.config.workers.max(1))
    }

    /// Checks that a request can be turned into jobs.
    pub fn validate(request: &BatchRequest) -> Result<(), ValidationError> {
        if request.watermark.is_none() {
            return Err(ValidationError::MissingWatermark);
        }
        if request.videos.is_empty() {
            return Err(ValidationError::NoVideos);
        }
        Ok(())
    }

    /// Runs every video of the request and waits for all of them.
    ///
    /// Job failures are recorded in the result; only validation and batch
    /// scratch failures are returned as errors.
    pub async fn submit(&self, request: BatchRequest) -> Result<BatchResult, EngineError> {
        let started = Instant::now();

        if let Err(e) = Self::validate(&request) {
            metrics::BATCHES_TOTAL.with_label_values(&["rejected"]).inc();
            warn!(error = %e, "Rejected batch");
            return Err(e.into());
        }

        let BatchRequest {
            watermark,
            videos,
            position,
        } = request;
        let watermark = watermark.ok_or(ValidationError::MissingWatermark)?;

        let batch_id = Uuid::new_v4().to_string();
        let total = videos.len();

        info!(
            batch_id = %batch_id,
            videos = total,
            position = %position,
            workers = self.config.workers,
            "Starting batch"
        );

        let batch = match self.scratch.open_batch(&batch_id, &watermark).await {
            Ok(batch) => Arc::new(batch),
            Err(e) => {
                metrics::BATCHES_TOTAL.with_label_values(&["error"]).inc();
                error!(batch_id = %batch_id, error = %e, "Failed to prepare batch scratch");
                return Err(EngineError::io("preparing batch scratch", e));
            }
        };

        let pool = WorkerPool::with_limit(
            POOL_NAME,
            self.config.workers,
            Arc::clone(&self.stats),
            Arc::clone(&self.permits),
        );
        let mut filenames = Vec::with_capacity(total);

        for (index, video) in videos.into_iter().enumerate() {
            filenames.push(video.filename().to_string());

            let job = Job::new(index, video, position);
            let ctx = JobContext {
                batch_id: batch_id.clone(),
                transcoder: Arc::clone(&self.transcoder),
                batch: Arc::clone(&batch),
                retry: self.config.retry.clone(),
                margin: self.margin,
            };

            if let Err(e) = pool.submit(run_job(job, ctx)) {
                error!(batch_id = %batch_id, index, error = %e, "Failed to dispatch job");
            }
        }

        let completed = pool.join().await;
        let results = self.collect_results(&batch_id, completed, filenames);
        let failed = results.iter().filter(|r| !r.is_success()).count();

        let bundled = if total > 1 {
            self.bundle(&batch_id, results).await
        } else {
            Ok((results, None, None))
        };

        batch.release().await;

        let (results, archive, archive_error) = match bundled {
            Ok(bundled) => bundled,
            Err(e) => {
                metrics::BATCHES_TOTAL.with_label_values(&["error"]).inc();
                error!(batch_id = %batch_id, error = %e, "Archive task was cancelled");
                return Err(EngineError::Interrupted(e.to_string()));
            }
        };

        let label = match failed {
            0 => "succeeded",
            n if n == total => "failed",
            _ => "partial",
        };
        metrics::BATCHES_TOTAL.with_label_values(&[label]).inc();
        metrics::BATCH_SIZE.observe(total as f64);
        metrics::BATCH_DURATION.observe(started.elapsed().as_secs_f64());

        info!(
            batch_id = %batch_id,
            succeeded = total - failed,
            failed,
            archive = archive.is_some(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Batch finished"
        );

        Ok(BatchResult {
            batch_id,
            results,
            failed,
            archive,
            archive_error,
        })
    }

    /// Restores input order and fills in jobs that never reported back.
    fn collect_results(
        &self,
        batch_id: &str,
        completed: Vec<JobResult>,
        filenames: Vec<String>,
    ) -> Vec<JobResult> {
        let mut slots: Vec<Option<JobResult>> = filenames.iter().map(|_| None).collect();

        for result in completed {
            let (result_label, kind) = match &result.outcome {
                JobOutcome::Succeeded(_) => ("success", "none"),
                JobOutcome::Failed(failure) => {
                    self.stats.record_failure();
                    ("failed", failure.kind.as_str())
                }
            };
            metrics::JOBS_TOTAL
                .with_label_values(&[result_label, kind])
                .inc();

            let index = result.index;
            match slots.get_mut(index) {
                Some(slot) => *slot = Some(result),
                None => error!(batch_id, index, "Discarding result with unknown index"),
            }
        }

        slots
            .into_iter()
            .zip(filenames)
            .enumerate()
            .map(|(index, (slot, filename))| {
                slot.unwrap_or_else(|| {
                    warn!(batch_id, index, "Job produced no result");
                    let error = JobError::Aborted("job produced no result".to_string());
                    metrics::JOBS_TOTAL
                        .with_label_values(&["failed", error.kind()])
                        .inc();
                    JobResult::aborted(index, filename, error)
                })
            })
            .collect()
    }

    /// Builds the archive off the async runtime.
    ///
    /// Bundling failures, panics included, are reported in the second and
    /// third fields. The only error is the blocking task being cancelled,
    /// which takes the results with it.
    async fn bundle(
        &self,
        batch_id: &str,
        results: Vec<JobResult>,
    ) -> Result<(Vec<JobResult>, Option<Download>, Option<String>), JoinError> {
        let bundler = self.bundler.clone();
        let (results, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| bundler.bundle(&results)));
            (results, outcome)
        })
        .await?;

        let (archive, archive_error) = match outcome {
            Ok(Ok(archive)) => {
                if archive.is_some() {
                    metrics::ARCHIVES_TOTAL.with_label_values(&["success"]).inc();
                }
                (archive, None)
            }
            Ok(Err(e)) => {
                metrics::ARCHIVES_TOTAL.with_label_values(&["failed"]).inc();
                error!(batch_id, error = %e, "Failed to bundle archive");
                (None, Some(e.to_string()))
            }
            Err(_) => {
                metrics::ARCHIVES_TOTAL.with_label_values(&["failed"]).inc();
                error!(batch_id, "Archive bundling panicked");
                (None, Some("Archive bundling panicked".to_string()))
            }
        };

        Ok((results, archive, archive_error))
    }
}

async fn run_job(mut job: Job, ctx: JobContext) -> JobResult {
    job.start();
    debug!(
        batch_id = %ctx.batch_id,
        index = job.index(),
        filename = %job.video().filename(),
        "Job started"
    );

    let outcome = execute(&mut job, &ctx).await;
    let result = job.finish(outcome);

    match &result.outcome {
        JobOutcome::Succeeded(download) => debug!(
            batch_id = %ctx.batch_id,
            index = result.index,
            size_bytes = download.bytes.len(),
            duration_ms = result.duration_ms,
            "Job succeeded"
        ),
        JobOutcome::Failed(failure) => warn!(
            batch_id = %ctx.batch_id,
            index = result.index,
            filename = %result.original_filename,
            kind = %failure.kind,
            error = %failure.message,
            "Job failed"
        ),
    }

    result
}

async fn execute(job: &mut Job, ctx: &JobContext) -> Result<Vec<u8>, JobError> {
    let scratch = ctx
        .batch
        .allocate_job(job.index(), job.video())
        .await
        .map_err(|e| JobError::io("preparing job scratch", e))?;

    let request = OverlayRequest {
        job_id: format!("{}-{}", ctx.batch_id, job.index()),
        video_path: scratch.input_path().to_path_buf(),
        watermark_path: ctx.batch.watermark_path().to_path_buf(),
        output_path: scratch.output_path().to_path_buf(),
        expr: job.position().overlay_expr(ctx.margin),
    };

    let transcoded = transcode_with_retry(job, ctx, &request).await;
    scratch.release_inputs().await;

    let output = match transcoded {
        Ok(_) => scratch
            .read_output()
            .await
            .map_err(|e| JobError::io("reading transcoder output", e)),
        Err(e) => Err(e),
    };

    scratch.release().await;
    output
}

async fn transcode_with_retry(
    job: &mut Job,
    ctx: &JobContext,
    request: &OverlayRequest,
) -> Result<(), JobError> {
    loop {
        job.record_attempt();
        let attempt = job.attempts();
        let started = Instant::now();

        match ctx.transcoder.overlay(request).await {
            Ok(_) => {
                metrics::TRANSCODE_DURATION
                    .with_label_values(&["success"])
                    .observe(started.elapsed().as_secs_f64());
                return Ok(());
            }
            Err(e) => {
                metrics::TRANSCODE_DURATION
                    .with_label_values(&["failed"])
                    .observe(started.elapsed().as_secs_f64());

                if attempt >= ctx.retry.max_attempts || !e.is_retryable() {
                    return Err(e.into());
                }

                let delay = ctx.retry.delay_for(attempt);
                metrics::RETRY_ATTEMPTS.inc();
                warn!(
                    job_id = %request.job_id,
                    attempt,
                    max_attempts = ctx.retry.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transcode failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
