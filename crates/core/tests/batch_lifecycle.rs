//! Batch lifecycle integration tests.
//!
//! These tests run whole batches through the engine with mock transcoders:
//! - Result ordering independent of completion order
//! - Archive contents for multi-video batches
//! - Failure isolation between jobs
//! - Bounded concurrency
//! - Scratch cleanup

use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use zip::ZipArchive;

use watermarker_core::{
    engine::JobState,
    testing::{fixtures, MockTranscoder, MOCK_OUTPUT_PREFIX},
    BatchRequest, BatchResult, EngineConfig, JobEngine, OverlayRequest, Position, TranscodeError,
    Transcoder, VideoAsset,
};

/// Test helper wiring an engine to a mock transcoder and a temp scratch root.
struct TestHarness {
    engine: JobEngine,
    transcoder: Arc<MockTranscoder>,
    scratch: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_workers(4)
    }

    fn with_workers(workers: usize) -> Self {
        let scratch = TempDir::new().expect("Failed to create scratch dir");
        let transcoder = Arc::new(MockTranscoder::new());
        let config = EngineConfig::default()
            .with_workers(workers)
            .with_scratch_dir(scratch.path());
        let engine = JobEngine::new(config, transcoder.clone());

        Self {
            engine,
            transcoder,
            scratch,
        }
    }

    fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path())
            .expect("scratch root exists")
            .count()
    }
}

fn expected_output(filename: &str) -> Vec<u8> {
    let mut bytes = MOCK_OUTPUT_PREFIX.to_vec();
    bytes.extend_from_slice(&fixtures::video_bytes(filename));
    bytes
}

fn archive_entries(result: &BatchResult) -> Vec<(String, Vec<u8>)> {
    let archive = result.archive.as_ref().expect("archive present");
    let mut zip = ZipArchive::new(Cursor::new(archive.bytes.clone())).expect("valid zip");
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).expect("entry readable");
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes).expect("entry content");
            (file.name().to_string(), bytes)
        })
        .collect()
}

/// Finishes jobs in reverse submission order: earlier inputs sleep longer.
struct ReverseOrderTranscoder {
    total: usize,
}

#[async_trait]
impl Transcoder for ReverseOrderTranscoder {
    fn name(&self) -> &str {
        "reverse"
    }

    async fn overlay(&self, request: &OverlayRequest) -> Result<PathBuf, TranscodeError> {
        let input = tokio::fs::read(&request.video_path).await?;
        let name = String::from_utf8_lossy(&input).to_string();
        let index: usize = name
            .trim_start_matches("video:clip")
            .trim_end_matches(".mp4")
            .parse()
            .expect("fixture name carries its index");

        let delay = (self.total - index) as u64 * 15;
        tokio::time::sleep(Duration::from_millis(delay)).await;

        tokio::fs::write(&request.output_path, &input).await?;
        Ok(request.output_path.clone())
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_results_follow_input_order() {
    let scratch = TempDir::new().unwrap();
    let names: Vec<String> = (0..6).map(|i| format!("clip{}.mp4", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let engine = JobEngine::new(
        EngineConfig::default().with_scratch_dir(scratch.path()),
        Arc::new(ReverseOrderTranscoder { total: names.len() }),
    );

    let result = engine
        .submit(fixtures::batch_request(&refs, Position::BottomRight))
        .await
        .unwrap();

    let order: Vec<&str> = result
        .results
        .iter()
        .map(|r| r.original_filename.as_str())
        .collect();
    assert_eq!(order, refs);

    for (index, job) in result.results.iter().enumerate() {
        assert_eq!(job.index, index);
    }

    let entry_names: Vec<String> = archive_entries(&result).into_iter().map(|(n, _)| n).collect();
    let expected: Vec<String> = names.iter().map(|n| format!("watermarked_{}", n)).collect();
    assert_eq!(entry_names, expected);
}

#[tokio::test]
async fn test_all_succeeded_batch_produces_archive() {
    let harness = TestHarness::new();
    let request = fixtures::batch_request(&["a.mp4", "b.mkv"], Position::TopRight);

    let result = harness.engine.submit(request).await.unwrap();

    assert_eq!(result.failed, 0);
    assert_eq!(result.succeeded(), 2);
    assert!(result.results.iter().all(|r| r.state() == JobState::Succeeded));

    assert_eq!(
        archive_entries(&result),
        vec![
            ("watermarked_a.mp4".to_string(), expected_output("a.mp4")),
            ("watermarked_b.mkv".to_string(), expected_output("b.mkv")),
        ]
    );

    let downloads: Vec<&str> = result
        .downloads()
        .iter()
        .map(|d| d.filename.as_str())
        .collect();
    assert_eq!(
        downloads,
        vec!["watermarked_a.mp4", "watermarked_b.mkv", "watermarked_videos.zip"]
    );
    assert_eq!(
        result.primary_download().map(|d| d.filename.as_str()),
        Some("watermarked_videos.zip")
    );
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let harness = TestHarness::new();
    harness.transcoder.set_failure_marker("malformed").await;

    let request = fixtures::batch_request(
        &["first.mp4", "malformed.avi", "third.flv"],
        Position::BottomLeft,
    );
    let result = harness.engine.submit(request).await.unwrap();

    assert_eq!(result.results.len(), 3);
    assert_eq!(result.failed, 1);

    assert!(result.results[0].is_success());
    assert!(result.results[2].is_success());

    let failure = result.results[1].failure().expect("second job failed");
    assert_eq!(failure.kind, "exit_status");
    assert!(failure.message.contains("Invalid data found"));

    let names: Vec<String> = archive_entries(&result).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["watermarked_first.mp4", "watermarked_third.flv"]);

    let report = serde_json::to_value(result.report()).unwrap();
    assert_eq!(report["failed"], 1);
    assert_eq!(report["jobs"][1]["status"], "failed");
    assert_eq!(report["jobs"][1]["filename"], "malformed.avi");

    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn test_all_failed_batch_has_no_archive() {
    let harness = TestHarness::new();
    harness.transcoder.set_failure_marker("video:").await;

    let request = fixtures::batch_request(&["a.mp4", "b.mp4"], Position::TopLeft);
    let result = harness.engine.submit(request).await.unwrap();

    assert_eq!(result.failed, 2);
    assert!(result.archive.is_none());
    assert!(result.archive_error.is_none());
    assert!(result.downloads().is_empty());
    assert!(result.primary_download().is_none());
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn test_concurrency_never_exceeds_workers() {
    let harness = TestHarness::with_workers(4);
    harness
        .transcoder
        .set_overlay_duration(Duration::from_millis(30))
        .await;

    let names: Vec<String> = (0..10).map(|i| format!("video{}.mp4", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let result = harness
        .engine
        .submit(fixtures::batch_request(&refs, Position::BottomRight))
        .await
        .unwrap();

    assert_eq!(result.failed, 0);
    assert_eq!(harness.transcoder.overlay_count().await, 10);

    let peak = harness.transcoder.peak_concurrency();
    assert!(peak <= 4, "peak concurrency {} exceeded 4 workers", peak);
    assert!(peak >= 2, "jobs never overlapped (peak {})", peak);

    let status = harness.engine.status();
    assert_eq!(status.total_processed, 10);
    assert_eq!(status.active_jobs, 0);
}

#[tokio::test]
async fn test_single_video_batch_returns_video_only() {
    let harness = TestHarness::new();
    let request = fixtures::batch_request(&["holiday.mkv"], Position::TopLeft);

    let result = harness.engine.submit(request).await.unwrap();

    assert!(result.archive.is_none());
    assert_eq!(result.downloads().len(), 1);

    let download = result.primary_download().unwrap();
    assert_eq!(download.filename, "watermarked_holiday.mkv");
    assert_eq!(download.content_type, "video/x-matroska");
    assert_eq!(download.bytes, expected_output("holiday.mkv"));
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn test_watermark_is_shared_by_all_jobs() {
    let harness = TestHarness::new();
    let request = fixtures::batch_request(&["a.mp4", "b.mp4", "c.mp4"], Position::BottomRight);

    harness.engine.submit(request).await.unwrap();

    let recorded = harness.transcoder.recorded_overlays().await;
    assert_eq!(recorded.len(), 3);
    let watermark = &recorded[0].request.watermark_path;
    assert!(recorded.iter().all(|r| &r.request.watermark_path == watermark));

    let mut outputs: Vec<&PathBuf> = recorded.iter().map(|r| &r.request.output_path).collect();
    outputs.sort();
    outputs.dedup();
    assert_eq!(outputs.len(), 3);
}

#[tokio::test]
async fn test_empty_video_fails_in_its_own_job() {
    let harness = TestHarness::new();
    let mut request = fixtures::batch_request(&["a.mp4", "c.mp4"], Position::BottomRight);
    request
        .videos
        .push(VideoAsset::new("empty.mp4", Vec::new()).unwrap());

    let result = harness.engine.submit(request).await.unwrap();

    assert_eq!(result.results.len(), 3);
    assert_eq!(result.succeeded(), 2);
    assert_eq!(result.failed, 1);
    assert!(result.results[0].is_success());
    assert!(result.results[1].is_success());

    let failure = result.results[2].failure().expect("empty video failed");
    assert_eq!(failure.kind, "exit_status");
    assert!(matches!(result.results[2].state(), JobState::Failed { .. }));

    let names: Vec<String> = archive_entries(&result).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["watermarked_a.mp4", "watermarked_c.mp4"]);
    assert_eq!(harness.scratch_entries(), 0);
}

/// Panics on inputs containing "explode", otherwise copies the input.
struct PanickingTranscoder;

#[async_trait]
impl Transcoder for PanickingTranscoder {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn overlay(&self, request: &OverlayRequest) -> Result<PathBuf, TranscodeError> {
        let input = tokio::fs::read(&request.video_path).await?;
        if String::from_utf8_lossy(&input).contains("explode") {
            panic!("transcoder blew up on {}", request.job_id);
        }
        tokio::fs::write(&request.output_path, &input).await?;
        Ok(request.output_path.clone())
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_panicking_job_is_aborted_and_siblings_survive() {
    let scratch = TempDir::new().unwrap();
    let engine = JobEngine::new(
        EngineConfig::default().with_scratch_dir(scratch.path()),
        Arc::new(PanickingTranscoder),
    );

    let result = engine
        .submit(fixtures::batch_request(
            &["a.mp4", "explode.mp4", "c.mp4"],
            Position::TopRight,
        ))
        .await
        .unwrap();

    assert_eq!(result.results.len(), 3);
    assert_eq!(result.failed, 1);
    assert!(result.results.iter().all(|r| r.state().is_terminal()));

    let failure = result.results[1].failure().expect("panicked job failed");
    assert_eq!(failure.kind, "aborted");
    assert_eq!(result.results[1].original_filename, "explode.mp4");

    let names: Vec<String> = archive_entries(&result).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["watermarked_a.mp4", "watermarked_c.mp4"]);

    let status = engine.status();
    assert_eq!(status.total_processed, 3);
    assert_eq!(status.total_failed, 1);
    assert_eq!(status.active_jobs, 0);

    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

/// Reports success without ever writing the output file.
struct SilentTranscoder;

#[async_trait]
impl Transcoder for SilentTranscoder {
    fn name(&self) -> &str {
        "silent"
    }

    async fn overlay(&self, request: &OverlayRequest) -> Result<PathBuf, TranscodeError> {
        Ok(request.output_path.clone())
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_missing_output_fails_with_io_error() {
    let scratch = TempDir::new().unwrap();
    let engine = JobEngine::new(
        EngineConfig::default().with_scratch_dir(scratch.path()),
        Arc::new(SilentTranscoder),
    );

    let result = engine
        .submit(fixtures::batch_request(&["a.mp4"], Position::BottomLeft))
        .await
        .unwrap();

    assert_eq!(result.failed, 1);
    let failure = result.results[0].failure().expect("job failed");
    assert_eq!(failure.kind, "io");
    assert!(failure.message.contains("reading transcoder output"));
    assert!(result.primary_download().is_none());

    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_concurrent_batches_share_the_worker_bound() {
    let harness = TestHarness::with_workers(2);
    harness
        .transcoder
        .set_overlay_duration(Duration::from_millis(20))
        .await;

    let first: BatchRequest =
        fixtures::batch_request(&["a1.mp4", "a2.mp4", "a3.mp4", "a4.mp4"], Position::TopLeft);
    let second: BatchRequest =
        fixtures::batch_request(&["b1.mp4", "b2.mp4", "b3.mp4", "b4.mp4"], Position::TopLeft);

    let (first, second) = tokio::join!(
        harness.engine.submit(first),
        harness.engine.submit(second)
    );

    assert_eq!(first.unwrap().failed, 0);
    assert_eq!(second.unwrap().failed, 0);

    let peak = harness.transcoder.peak_concurrency();
    assert!(peak <= 2, "peak concurrency {} exceeded 2 workers", peak);

    let status = harness.engine.status();
    assert_eq!(status.max_concurrent, 2);
    assert_eq!(status.total_processed, 8);
    assert_eq!(status.queued_jobs, 0);
}
