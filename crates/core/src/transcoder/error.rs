//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while compositing a watermark onto a video.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    NotFound { path: PathBuf },

    /// The process could not be started for another reason.
    #[error("Failed to start FFmpeg: {0}")]
    Spawn(#[source] std::io::Error),

    /// I/O error while waiting on a running process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// FFmpeg ran and exited with a non-zero status.
    #[error("FFmpeg exited with {}: {}", exit_label(.exit_code), stderr_summary(.stderr))]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// FFmpeg reported success but left no output behind.
    #[error("FFmpeg produced no output at {path}")]
    MissingOutput { path: PathBuf },

    /// The invocation exceeded the configured timeout and was killed.
    #[error("FFmpeg timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "signal".to_string(),
    }
}

fn stderr_summary(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        "no error output"
    } else {
        trimmed
    }
}

impl TranscodeError {
    /// Creates a failed error from an exit code and captured stderr.
    pub fn failed(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::Failed {
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Whether this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Spawn(_) | Self::Io(_))
    }

    /// Short machine-readable tag used in reports and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Spawn(_) => "spawn",
            Self::Io(_) => "io",
            Self::Failed { .. } => "exit_status",
            Self::MissingOutput { .. } => "missing_output",
            Self::Timeout { .. } => "timeout",
        }
    }
}
