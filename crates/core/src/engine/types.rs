//! Types for the engine module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::error::{JobError, ValidationError};
use crate::transcoder::Position;

/// Prefix for every watermarked output name.
pub const OUTPUT_PREFIX: &str = "watermarked_";

/// Name of the archive bundling a multi-video batch.
pub const ARCHIVE_FILENAME: &str = "watermarked_videos.zip";

/// Last path component of a client-supplied filename.
///
/// Browsers on some platforms send full paths with either separator.
pub(crate) fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(basename(name))
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Accepted watermark image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Accepted video containers. Output keeps the input container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Mp4,
    Mkv,
    Flv,
    Avi,
}

impl VideoFormat {
    pub const ALLOWED_EXTENSIONS: [&'static str; 4] = ["mp4", "mkv", "flv", "avi"];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "mkv" => Some(Self::Mkv),
            "flv" => Some(Self::Flv),
            "avi" => Some(Self::Avi),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Flv => "flv",
            Self::Avi => "avi",
        }
    }

    /// MIME type offered with the download.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Mkv => "video/x-matroska",
            Self::Flv => "video/x-flv",
            Self::Avi => "video/x-msvideo",
        }
    }
}

/// The watermark image shared read-only by every job in a batch.
#[derive(Clone)]
pub struct WatermarkAsset {
    filename: String,
    format: ImageFormat,
    bytes: Arc<[u8]>,
}

impl WatermarkAsset {
    /// Validates the filename extension.
    pub fn new(
        filename: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<Self, ValidationError> {
        let filename = filename.into();
        let bytes = bytes.into();

        let format = extension_of(&filename)
            .and_then(|ext| ImageFormat::from_extension(&ext))
            .ok_or_else(|| ValidationError::UnsupportedImage {
                filename: filename.clone(),
            })?;

        Ok(Self {
            filename,
            format,
            bytes,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for WatermarkAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatermarkAsset")
            .field("filename", &self.filename)
            .field("format", &self.format)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// One uploaded video.
#[derive(Clone)]
pub struct VideoAsset {
    filename: String,
    format: VideoFormat,
    bytes: Vec<u8>,
}

impl VideoAsset {
    /// Validates the filename against the allowed container set.
    ///
    /// Content is not inspected; malformed videos fail later in their own job.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ValidationError> {
        let filename = filename.into();

        let format = extension_of(&filename)
            .and_then(|ext| VideoFormat::from_extension(&ext))
            .ok_or_else(|| ValidationError::UnsupportedVideo {
                filename: filename.clone(),
            })?;

        Ok(Self {
            filename,
            format,
            bytes,
        })
    }

    /// Filename as uploaded.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Download name for the watermarked result.
    pub fn output_filename(&self) -> String {
        format!("{}{}", OUTPUT_PREFIX, basename(&self.filename))
    }
}

impl fmt::Debug for VideoAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoAsset")
            .field("filename", &self.filename)
            .field("format", &self.format)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// One batch submission, built once per invocation.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub watermark: Option<WatermarkAsset>,
    pub videos: Vec<VideoAsset>,
    pub position: Position,
}

impl BatchRequest {
    pub fn new(watermark: WatermarkAsset, videos: Vec<VideoAsset>, position: Position) -> Self {
        Self {
            watermark: Some(watermark),
            videos,
            position,
        }
    }
}

/// A named byte stream handed back to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed { error: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

/// The unit of work: one video and the corner its watermark goes in.
///
/// `finish` consumes the job, so a job reaches exactly one terminal state.
#[derive(Debug)]
pub struct Job {
    index: usize,
    video: VideoAsset,
    position: Position,
    state: JobState,
    started_at: Option<Instant>,
    attempts: u32,
}

impl Job {
    pub fn new(index: usize, video: VideoAsset, position: Position) -> Self {
        Self {
            index,
            video,
            position,
            state: JobState::Pending,
            started_at: None,
            attempts: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn video(&self) -> &VideoAsset {
        &self.video
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Pending -> Running.
    pub fn start(&mut self) {
        debug_assert_eq!(self.state, JobState::Pending);
        self.state = JobState::Running;
        self.started_at = Some(Instant::now());
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Running -> Succeeded | Failed.
    pub fn finish(self, outcome: Result<Vec<u8>, JobError>) -> JobResult {
        let duration_ms = self
            .started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        let outcome = match outcome {
            Ok(bytes) => JobOutcome::Succeeded(Download {
                filename: self.video.output_filename(),
                content_type: self.video.format().mime_type().to_string(),
                bytes,
            }),
            Err(error) => JobOutcome::Failed(JobFailure::from(&error)),
        };

        JobResult {
            index: self.index,
            original_filename: self.video.filename,
            outcome,
            attempts: self.attempts,
            duration_ms,
        }
    }
}

/// Error detail of a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: String,
    pub message: String,
}

impl From<&JobError> for JobFailure {
    fn from(error: &JobError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Terminal outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded(Download),
    Failed(JobFailure),
}

/// Result of one job, reported in input order.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub index: usize,
    pub original_filename: String,
    pub outcome: JobOutcome,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl JobResult {
    /// Result for a job that never ran to completion.
    pub(crate) fn aborted(index: usize, original_filename: String, error: JobError) -> Self {
        Self {
            index,
            original_filename,
            outcome: JobOutcome::Failed(JobFailure::from(&error)),
            attempts: 0,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Succeeded(_))
    }

    pub fn download(&self) -> Option<&Download> {
        match &self.outcome {
            JobOutcome::Succeeded(download) => Some(download),
            JobOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match &self.outcome {
            JobOutcome::Succeeded(_) => None,
            JobOutcome::Failed(failure) => Some(failure),
        }
    }

    pub fn state(&self) -> JobState {
        match &self.outcome {
            JobOutcome::Succeeded(_) => JobState::Succeeded,
            JobOutcome::Failed(failure) => JobState::Failed {
                error: failure.message.clone(),
            },
        }
    }

    pub fn report(&self) -> JobReport {
        JobReport {
            index: self.index,
            filename: self.original_filename.clone(),
            download_name: self.download().map(|d| d.filename.clone()),
            status: if self.is_success() {
                "succeeded".to_string()
            } else {
                "failed".to_string()
            },
            size_bytes: self.download().map(|d| d.bytes.len() as u64),
            error: self.failure().cloned(),
            attempts: self.attempts,
            duration_ms: self.duration_ms,
        }
    }
}

/// Aggregate outcome of one batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub batch_id: String,
    /// One entry per input video, in input order.
    pub results: Vec<JobResult>,
    pub failed: usize,
    /// Present for multi-video batches with at least one success.
    pub archive: Option<Download>,
    /// Set when bundling was attempted and failed.
    pub archive_error: Option<String>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.results.len() - self.failed
    }

    /// Every named byte stream: per-job outputs in input order, then the archive.
    pub fn downloads(&self) -> Vec<&Download> {
        self.results
            .iter()
            .filter_map(JobResult::download)
            .chain(self.archive.as_ref())
            .collect()
    }

    /// The archive for multi-video batches, the single output otherwise.
    pub fn primary_download(&self) -> Option<&Download> {
        if self.results.len() > 1 {
            self.archive.as_ref()
        } else {
            self.results.first().and_then(JobResult::download)
        }
    }

    /// Consumes the result and hands over the primary download without
    /// copying its payload.
    pub fn into_primary_download(self) -> Option<Download> {
        if self.results.len() > 1 {
            return self.archive;
        }
        match self.results.into_iter().next()?.outcome {
            JobOutcome::Succeeded(download) => Some(download),
            JobOutcome::Failed(_) => None,
        }
    }

    /// Payload-free summary suitable for serialization.
    pub fn report(&self) -> BatchReport {
        BatchReport {
            batch_id: self.batch_id.clone(),
            total: self.results.len(),
            failed: self.failed,
            archive: self.archive.as_ref().map(|a| a.filename.clone()),
            archive_error: self.archive_error.clone(),
            jobs: self.results.iter().map(JobResult::report).collect(),
        }
    }
}

/// Serializable per-job summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub index: usize,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_name: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Serializable batch summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub total: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_error: Option<String>,
    pub jobs: Vec<JobReport>,
}
