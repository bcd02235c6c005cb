//! Error types for the bundle module.

use thiserror::Error;

/// Errors that can occur while building an archive.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error while writing archive entry '{entry}': {source}")]
    Io {
        entry: String,
        #[source]
        source: std::io::Error,
    },
}
