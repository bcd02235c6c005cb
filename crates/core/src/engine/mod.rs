//! Engine module for batch watermarking.
//!
//! `JobEngine` turns one `BatchRequest` into one job per video, runs them on
//! a bounded worker pool and returns a `BatchResult` whose per-job results
//! are in input order regardless of completion order:
//!
//! 1. Validation: a watermark and at least one video are required
//! 2. Dispatch: every job gets its own scratch directory and runs the
//!    transcoder; a failing job never affects its siblings
//! 3. Collection: results are re-keyed by index, an archive is bundled for
//!    multi-video batches and all scratch storage is released
//!
//! # Example
//!
//! ```ignore
//! use watermarker_core::engine::{BatchRequest, EngineConfig, JobEngine, VideoAsset, WatermarkAsset};
//! use watermarker_core::transcoder::{FfmpegTranscoder, Position};
//!
//! let engine = JobEngine::new(EngineConfig::default(), Arc::new(FfmpegTranscoder::with_defaults()));
//!
//! let request = BatchRequest::new(
//!     WatermarkAsset::new("logo.png", logo_bytes)?,
//!     vec![VideoAsset::new("clip.mp4", video_bytes)?],
//!     Position::BottomRight,
//! );
//!
//! let result = engine.submit(request).await?;
//! for download in result.downloads() {
//!     println!("{} ({} bytes)", download.filename, download.bytes.len());
//! }
//! ```

mod config;
mod error;
mod runner;
mod types;

pub use config::{EngineConfig, RetryConfig};
pub use error::{EngineError, JobError, ValidationError};
pub use runner::{JobEngine, POOL_NAME};
pub use types::{
    BatchReport, BatchRequest, BatchResult, Download, ImageFormat, Job, JobFailure, JobOutcome,
    JobReport, JobResult, JobState, VideoAsset, VideoFormat, WatermarkAsset, ARCHIVE_FILENAME,
    OUTPUT_PREFIX,
};
