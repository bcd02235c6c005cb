//! Mock transcoder for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::transcoder::{OverlayRequest, TranscodeError, Transcoder};

/// Prefix the mock puts in front of the input bytes to form its output.
pub const MOCK_OUTPUT_PREFIX: &[u8] = b"watermarked:";

/// A recorded overlay invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedOverlay {
    /// The request that was submitted.
    pub request: OverlayRequest,
    /// Whether the invocation succeeded.
    pub success: bool,
}

/// Mock implementation of the Transcoder trait.
///
/// Provides controllable behavior for testing:
/// - Track overlay requests for assertions
/// - Simulate failures, either once or for inputs containing a marker
///   (empty inputs always fail, as they do with FFmpeg)
/// - Simulate processing time
/// - Measure peak concurrency
///
/// On success the output file holds `MOCK_OUTPUT_PREFIX` followed by the
/// input bytes.
///
/// # Example
///
/// ```rust,ignore
/// use watermarker_core::testing::MockTranscoder;
///
/// let transcoder = Arc::new(MockTranscoder::new());
/// transcoder.set_failure_marker("corrupt").await;
///
/// let engine = JobEngine::new(config, transcoder.clone());
/// engine.submit(request).await?;
///
/// assert!(transcoder.peak_concurrency() <= 4);
/// ```
#[derive(Debug, Default)]
pub struct MockTranscoder {
    /// Recorded overlays.
    overlays: Arc<RwLock<Vec<RecordedOverlay>>>,
    /// If set, the next invocation will fail with this error.
    next_error: Arc<RwLock<Option<TranscodeError>>>,
    /// Inputs whose bytes contain this marker fail like a malformed video.
    failure_marker: Arc<RwLock<Option<Vec<u8>>>>,
    /// Simulated processing time in milliseconds.
    overlay_duration_ms: Arc<RwLock<u64>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockTranscoder {
    /// Create a new mock transcoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded overlays.
    pub async fn recorded_overlays(&self) -> Vec<RecordedOverlay> {
        self.overlays.read().await.clone()
    }

    /// Get the number of overlay invocations.
    pub async fn overlay_count(&self) -> usize {
        self.overlays.read().await.len()
    }

    /// Configure the next invocation to fail with the given error.
    pub async fn set_next_error(&self, error: TranscodeError) {
        *self.next_error.write().await = Some(error);
    }

    /// Fail every input whose content contains `marker`.
    pub async fn set_failure_marker(&self, marker: &str) {
        *self.failure_marker.write().await = Some(marker.as_bytes().to_vec());
    }

    /// Set the simulated processing time.
    pub async fn set_overlay_duration(&self, duration: Duration) {
        *self.overlay_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Highest number of overlays observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn take_error(&self) -> Option<TranscodeError> {
        self.next_error.write().await.take()
    }

    async fn has_failure_marker(&self, input: &[u8]) -> bool {
        match self.failure_marker.read().await.as_deref() {
            Some(marker) if !marker.is_empty() => {
                input.windows(marker.len()).any(|w| w == marker)
            }
            _ => false,
        }
    }

    async fn run(&self, request: &OverlayRequest) -> Result<PathBuf, TranscodeError> {
        let duration_ms = *self.overlay_duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let input = tokio::fs::read(&request.video_path).await?;
        tokio::fs::metadata(&request.watermark_path).await?;

        if input.is_empty() || self.has_failure_marker(&input).await {
            return Err(TranscodeError::failed(
                Some(1),
                format!(
                    "{}: Invalid data found when processing input",
                    request.video_path.display()
                ),
            ));
        }

        let mut output = MOCK_OUTPUT_PREFIX.to_vec();
        output.extend_from_slice(&input);
        tokio::fs::write(&request.output_path, output).await?;

        Ok(request.output_path.clone())
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn overlay(&self, request: &OverlayRequest) -> Result<PathBuf, TranscodeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = self.run(request).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.overlays.write().await.push(RecordedOverlay {
            request: request.clone(),
            success: result.is_ok(),
        });

        result
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}
