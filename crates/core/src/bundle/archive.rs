//! Zip bundling of succeeded job outputs.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::BundleError;
use crate::engine::{Download, JobResult, ARCHIVE_FILENAME};

/// MIME type of the produced archive.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Packs the succeeded outputs of a multi-video batch into one archive.
#[derive(Debug, Clone)]
pub struct Bundler {
    filename: String,
    compression: CompressionMethod,
}

impl Default for Bundler {
    fn default() -> Self {
        Self {
            filename: ARCHIVE_FILENAME.to_string(),
            compression: CompressionMethod::Deflated,
        }
    }
}

impl Bundler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores entries without compression.
    pub fn stored(mut self) -> Self {
        self.compression = CompressionMethod::Stored;
        self
    }

    /// Builds the archive.
    ///
    /// Returns `None` for a single-result batch or when nothing succeeded.
    /// Entries follow result order; duplicate names get a ` (n)` suffix.
    pub fn bundle(&self, results: &[JobResult]) -> Result<Option<Download>, BundleError> {
        if results.len() <= 1 {
            return Ok(None);
        }

        let downloads: Vec<&Download> = results.iter().filter_map(JobResult::download).collect();
        if downloads.is_empty() {
            return Ok(None);
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let mut names = EntryNames::default();

        for download in &downloads {
            let entry = names.claim(&download.filename);
            let options = SimpleFileOptions::default()
                .compression_method(self.compression)
                .large_file(download.bytes.len() as u64 >= u32::MAX as u64);

            zip.start_file(entry.as_str(), options)?;
            zip.write_all(&download.bytes)
                .map_err(|source| BundleError::Io { entry, source })?;
        }

        let bytes = zip.finish()?.into_inner();

        debug!(
            entries = downloads.len(),
            size_bytes = bytes.len(),
            "Bundled archive"
        );

        Ok(Some(Download {
            filename: self.filename.clone(),
            content_type: ARCHIVE_CONTENT_TYPE.to_string(),
            bytes,
        }))
    }
}

/// Keeps archive entry names unique.
#[derive(Default)]
struct EntryNames {
    used: HashSet<String>,
}

impl EntryNames {
    fn claim(&mut self, name: &str) -> String {
        if self.used.insert(name.to_string()) {
            return name.to_string();
        }

        let path = Path::new(name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut n = 1;
        loop {
            let candidate = format!("{} ({}){}", stem, n, ext);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
