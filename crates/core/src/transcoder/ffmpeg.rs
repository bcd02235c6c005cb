//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::traits::Transcoder;
use super::types::OverlayRequest;

/// Amount of stderr kept on failure. FFmpeg puts the reason at the end.
const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Builds ffmpeg arguments for one overlay composition.
    fn build_args(&self, request: &OverlayRequest) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            request.video_path.to_string_lossy().to_string(),
            "-i".to_string(),
            request.watermark_path.to_string_lossy().to_string(),
            "-filter_complex".to_string(),
            format!("overlay={}", request.expr),
            "-codec:a".to_string(),
            "copy".to_string(),
        ];

        args.extend(["-loglevel".to_string(), self.config.log_level.clone()]);

        args.extend(self.config.extra_args.iter().cloned());

        args.push(request.output_path.to_string_lossy().to_string());

        args
    }

    fn spawn_error(&self, e: std::io::Error) -> TranscodeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            TranscodeError::NotFound {
                path: self.config.ffmpeg_path.clone(),
            }
        } else {
            TranscodeError::Spawn(e)
        }
    }
}

/// Keeps the last `STDERR_TAIL_BYTES` of captured output, on a char boundary.
fn stderr_tail(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if text.len() <= STDERR_TAIL_BYTES {
        return text.trim().to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].trim().to_string()
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn overlay(&self, request: &OverlayRequest) -> Result<PathBuf, TranscodeError> {
        let start = Instant::now();
        let args = self.build_args(request);

        debug!(
            job_id = %request.job_id,
            expr = %request.expr,
            "Starting ffmpeg overlay"
        );

        let child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match self.config.timeout_secs {
            Some(timeout_secs) => {
                match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!(job_id = %request.job_id, timeout_secs, "ffmpeg timed out, killed");
                        return Err(TranscodeError::Timeout { timeout_secs });
                    }
                }
            }
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            debug!(
                job_id = %request.job_id,
                code = ?output.status.code(),
                "ffmpeg failed"
            );
            return Err(TranscodeError::failed(output.status.code(), stderr));
        }

        if tokio::fs::metadata(&request.output_path).await.is_err() {
            return Err(TranscodeError::MissingOutput {
                path: request.output_path.clone(),
            });
        }

        debug!(
            job_id = %request.job_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "ffmpeg overlay finished"
        );

        Ok(request.output_path.clone())
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(TranscodeError::failed(
                output.status.code(),
                stderr_tail(&output.stderr),
            ));
        }

        Ok(())
    }
}
