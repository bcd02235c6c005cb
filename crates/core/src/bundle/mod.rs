//! Bundle module for packaging batch outputs.
//!
//! Multi-video batches get one zip archive, `watermarked_videos.zip`, holding
//! every succeeded output under its download name.

mod archive;
mod error;

pub use archive::{Bundler, ARCHIVE_CONTENT_TYPE};
pub use error::BundleError;
