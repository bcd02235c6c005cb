//! Transcoder module for compositing a watermark onto videos.
//!
//! This module provides the `Transcoder` trait and an FFmpeg implementation.
//! The transcoder only contracts with the external tool's invocation and exit
//! status; pixel work is entirely FFmpeg's.
//!
//! # Example
//!
//! ```ignore
//! use watermarker_core::transcoder::{FfmpegTranscoder, OverlayRequest, Position, Transcoder};
//!
//! let transcoder = FfmpegTranscoder::with_defaults();
//! transcoder.validate().await?;
//!
//! let request = OverlayRequest {
//!     job_id: "batch-0".to_string(),
//!     video_path: PathBuf::from("/scratch/input.mp4"),
//!     watermark_path: PathBuf::from("/scratch/watermark.png"),
//!     output_path: PathBuf::from("/scratch/output.mp4"),
//!     expr: Position::BottomRight.overlay_expr(10),
//! };
//!
//! let output = transcoder.overlay(&request).await?;
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::{TranscoderConfig, DEFAULT_MARGIN};
pub use error::TranscodeError;
pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;
pub use types::{Anchor, OverlayExpr, OverlayRequest, ParsePositionError, Position, Size};
