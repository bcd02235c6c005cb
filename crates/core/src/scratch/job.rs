//! Per-job scratch area.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::release::{remove_dir, remove_dir_blocking, remove_file};

/// Scratch paths owned by exactly one job: `<batch>/job-<index>/`.
///
/// Both release steps run at most once and never touch paths outside the
/// job directory.
#[derive(Debug)]
pub struct JobScratch {
    index: usize,
    dir: PathBuf,
    input_path: PathBuf,
    output_path: PathBuf,
    inputs_released: AtomicBool,
    released: AtomicBool,
}

impl JobScratch {
    pub(crate) fn new(index: usize, dir: PathBuf, extension: &str) -> Self {
        Self {
            index,
            input_path: dir.join(format!("input.{}", extension)),
            output_path: dir.join(format!("output.{}", extension)),
            dir,
            inputs_released: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the job's copy of the uploaded video.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Path the transcoder writes to.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Deletes the input copy.
    pub async fn release_inputs(&self) {
        if self.inputs_released.swap(true, Ordering::AcqRel) {
            return;
        }
        remove_file(&self.input_path, "job input").await;
    }

    /// Reads the transcoder output.
    pub async fn read_output(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.output_path).await
    }

    /// Deletes the whole job directory, output included.
    pub async fn release(&self) {
        self.inputs_released.store(true, Ordering::Release);
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        remove_dir(&self.dir, "job directory").await;
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for JobScratch {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            remove_dir_blocking(&self.dir, "job directory");
        }
    }
}
