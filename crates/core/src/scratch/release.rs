//! Best-effort removal shared by batch and job scratch areas.

use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

use crate::metrics;

/// Removes a directory tree. Already-missing paths count as released.
pub(crate) async fn remove_dir(path: &Path, what: &'static str) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => debug!(path = %path.display(), what, "Released scratch directory"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => report_failure(path, what, &e),
    }
}

/// Removes a single file. Already-missing paths count as released.
pub(crate) async fn remove_file(path: &Path, what: &'static str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), what, "Released scratch file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => report_failure(path, what, &e),
    }
}

/// Synchronous variant for `Drop`.
pub(crate) fn remove_dir_blocking(path: &Path, what: &'static str) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), what, "Released scratch directory on drop"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => report_failure(path, what, &e),
    }
}

fn report_failure(path: &Path, what: &'static str, error: &std::io::Error) {
    metrics::SCRATCH_RELEASE_FAILURES.inc();
    warn!(
        path = %path.display(),
        what,
        error = %error,
        "Failed to release scratch storage"
    );
}
