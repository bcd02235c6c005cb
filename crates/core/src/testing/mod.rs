//! Testing utilities and mock implementations.
//!
//! This module provides a mock `Transcoder`, allowing the engine and the
//! HTTP surface to be tested without FFmpeg installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use watermarker_core::testing::{fixtures, MockTranscoder};
//!
//! let transcoder = Arc::new(MockTranscoder::new());
//! transcoder.set_failure_marker("corrupt").await;
//!
//! let request = fixtures::batch_request(&["a.mp4", "b.mkv"], Position::TopLeft);
//! // Use in JobEngine or AppState...
//! ```

mod mock_transcoder;

pub use mock_transcoder::{MockTranscoder, RecordedOverlay, MOCK_OUTPUT_PREFIX};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::engine::{BatchRequest, VideoAsset, WatermarkAsset};
    use crate::transcoder::Position;

    /// Minimal PNG signature used as watermark payload.
    pub const WATERMARK_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nwatermark";

    /// Create a PNG watermark asset.
    pub fn watermark() -> WatermarkAsset {
        WatermarkAsset::new("logo.png", WATERMARK_BYTES.to_vec())
            .expect("fixture watermark is valid")
    }

    /// Create a video asset whose content is derived from its name.
    pub fn video(filename: &str) -> VideoAsset {
        VideoAsset::new(filename, video_bytes(filename)).expect("fixture video is valid")
    }

    /// Content used for fixture videos.
    pub fn video_bytes(filename: &str) -> Vec<u8> {
        format!("video:{}", filename).into_bytes()
    }

    /// Create a batch request over the given filenames.
    pub fn batch_request(filenames: &[&str], position: Position) -> BatchRequest {
        BatchRequest::new(
            watermark(),
            filenames.iter().map(|name| video(name)).collect(),
            position,
        )
    }
}
