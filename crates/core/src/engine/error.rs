//! Error types for the engine module.

use thiserror::Error;

use crate::transcoder::TranscodeError;

/// A batch request that cannot be turned into jobs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A watermark image is required")]
    MissingWatermark,

    #[error("At least one video is required")]
    NoVideos,

    #[error("Unsupported video file '{filename}' (allowed: mp4, mkv, flv, avi)")]
    UnsupportedVideo { filename: String },

    #[error("Unsupported watermark image '{filename}' (allowed: png, jpg, jpeg)")]
    UnsupportedImage { filename: String },
}

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request was rejected before any job was created.
    #[error("Invalid batch: {0}")]
    Validation(#[from] ValidationError),

    /// Scratch space shared by the whole batch could not be prepared.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The batch was cut short before its results could be collected.
    #[error("Batch interrupted: {0}")]
    Interrupted(String),
}

impl EngineError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Errors scoped to a single job. They are recorded on the job's result and
/// never abort sibling jobs.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The job never produced a result (worker lost or pool closed).
    #[error("Job aborted: {0}")]
    Aborted(String),
}

impl JobError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    /// Short tag for reports and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transcode(e) => e.kind(),
            Self::Io { .. } => "io",
            Self::Aborted(_) => "aborted",
        }
    }
}
