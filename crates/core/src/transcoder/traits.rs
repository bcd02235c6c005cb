//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::path::PathBuf;

use super::error::TranscodeError;
use super::types::OverlayRequest;

/// Composes a watermark onto a video by delegating to an external tool.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Runs one overlay composition and returns the output path.
    ///
    /// The outcome is decided from the tool's exit status; captured error
    /// output travels with the error.
    async fn overlay(&self, request: &OverlayRequest) -> Result<PathBuf, TranscodeError>;

    /// Validates that the transcoder is properly configured and ready.
    async fn validate(&self) -> Result<(), TranscodeError>;
}
