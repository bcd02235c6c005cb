//! Batch scratch allocation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use super::job::JobScratch;
use super::release::{remove_dir, remove_dir_blocking};
use crate::engine::{VideoAsset, WatermarkAsset};

/// Hands out scratch areas under a single root directory.
#[derive(Debug, Clone)]
pub struct ScratchManager {
    root: PathBuf,
}

impl ScratchManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates `<root>/<batch_id>/` and writes the shared watermark copy.
    ///
    /// A partially created directory is removed again when this fails.
    pub async fn open_batch(
        &self,
        batch_id: &str,
        watermark: &WatermarkAsset,
    ) -> std::io::Result<BatchScratch> {
        let dir = self.root.join(batch_id);
        tokio::fs::create_dir_all(&dir).await?;

        let batch = BatchScratch {
            watermark_path: dir.join(format!("watermark.{}", watermark.format().extension())),
            dir,
            released: AtomicBool::new(false),
        };

        tokio::fs::write(&batch.watermark_path, watermark.bytes()).await?;

        debug!(batch_id, dir = %batch.dir.display(), "Opened batch scratch");
        Ok(batch)
    }
}

/// Scratch area for one batch, holding the single watermark copy read by
/// every job.
///
/// Shared by reference-counting between jobs; released once after the join.
#[derive(Debug)]
pub struct BatchScratch {
    dir: PathBuf,
    watermark_path: PathBuf,
    released: AtomicBool,
}

impl BatchScratch {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn watermark_path(&self) -> &Path {
        &self.watermark_path
    }

    /// Creates `job-<index>/` and writes the job's input copy.
    ///
    /// The returned scratch cleans up after itself if writing fails.
    pub async fn allocate_job(&self, index: usize, video: &VideoAsset) -> std::io::Result<JobScratch> {
        let dir = self.dir.join(format!("job-{}", index));
        tokio::fs::create_dir_all(&dir).await?;

        let job = JobScratch::new(index, dir, video.format().extension());
        tokio::fs::write(job.input_path(), video.bytes()).await?;

        Ok(job)
    }

    /// Deletes the batch directory, watermark copy included.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        remove_dir(&self.dir, "batch directory").await;
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for BatchScratch {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            remove_dir_blocking(&self.dir, "batch directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn watermark() -> WatermarkAsset {
        WatermarkAsset::new("logo.png", vec![0x89u8, b'P', b'N', b'G']).unwrap()
    }

    fn video(name: &str) -> VideoAsset {
        VideoAsset::new(name, b"video-bytes".to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_open_batch_writes_one_watermark_copy() {
        let temp = TempDir::new().unwrap();
        let manager = ScratchManager::new(temp.path());

        let batch = manager.open_batch("b-1", &watermark()).await.unwrap();
        assert_eq!(batch.dir(), temp.path().join("b-1"));
        assert_eq!(batch.watermark_path(), temp.path().join("b-1/watermark.png"));
        assert_eq!(
            std::fs::read(batch.watermark_path()).unwrap(),
            vec![0x89u8, b'P', b'N', b'G']
        );

        batch.release().await;
        assert!(batch.is_released());
        assert!(!temp.path().join("b-1").exists());
    }

    #[tokio::test]
    async fn test_allocate_job_keeps_container_extension() {
        let temp = TempDir::new().unwrap();
        let batch = ScratchManager::new(temp.path())
            .open_batch("b-2", &watermark())
            .await
            .unwrap();

        let job = batch.allocate_job(4, &video("clip.MKV")).await.unwrap();
        assert_eq!(job.index(), 4);
        assert_eq!(job.input_path(), temp.path().join("b-2/job-4/input.mkv"));
        assert_eq!(job.output_path(), temp.path().join("b-2/job-4/output.mkv"));
        assert_eq!(std::fs::read(job.input_path()).unwrap(), b"video-bytes");
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_isolated() {
        let temp = TempDir::new().unwrap();
        let batch = ScratchManager::new(temp.path())
            .open_batch("b-3", &watermark())
            .await
            .unwrap();

        let first = batch.allocate_job(0, &video("a.mp4")).await.unwrap();
        let second = batch.allocate_job(1, &video("b.mp4")).await.unwrap();
        std::fs::write(second.output_path(), b"out").unwrap();

        first.release_inputs().await;
        first.release_inputs().await;
        assert!(!first.input_path().exists());

        first.release().await;
        first.release().await;
        assert!(first.is_released());
        assert!(!first.dir().exists());

        // Sibling and shared files are untouched.
        assert!(second.input_path().exists());
        assert!(second.output_path().exists());
        assert!(batch.watermark_path().exists());

        assert_eq!(second.read_output().await.unwrap(), b"out");
        second.release().await;
        assert!(!second.dir().exists());
        assert!(batch.dir().exists());
    }

    #[tokio::test]
    async fn test_drop_releases_unreleased_paths() {
        let temp = TempDir::new().unwrap();
        let batch_dir;
        let job_dir;
        {
            let batch = ScratchManager::new(temp.path())
                .open_batch("b-4", &watermark())
                .await
                .unwrap();
            let job = batch.allocate_job(0, &video("a.avi")).await.unwrap();
            batch_dir = batch.dir().to_path_buf();
            job_dir = job.dir().to_path_buf();
            assert!(job_dir.exists());

            drop(job);
            assert!(!job_dir.exists());
            assert!(batch_dir.exists());
        }
        assert!(!batch_dir.exists());
    }

    #[tokio::test]
    async fn test_release_of_missing_directory_is_silent() {
        let temp = TempDir::new().unwrap();
        let batch = ScratchManager::new(temp.path())
            .open_batch("b-5", &watermark())
            .await
            .unwrap();

        std::fs::remove_dir_all(batch.dir()).unwrap();
        batch.release().await;
        assert!(batch.is_released());
    }
}
