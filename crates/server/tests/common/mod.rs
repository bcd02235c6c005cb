//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a `JobEngine` with a `MockTranscoder`, so batches can be
//! submitted end to end without FFmpeg installed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use watermarker_core::{testing::MockTranscoder, Config, EngineConfig, JobEngine};
use watermarker_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use watermarker_core::testing::fixtures;

const BOUNDARY: &str = "watermarker-test-boundary";

/// Test fixture for API testing with a mock transcoder.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock transcoder - inject failures and delays
    pub transcoder: Arc<MockTranscoder>,
    /// Scratch root for the engine
    pub scratch: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    /// Parse the body as JSON, `Null` when empty or not JSON.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the `X-Batch-Report` header.
    pub fn report(&self) -> Value {
        let raw = self.header("x-batch-report").expect("batch report header");
        serde_json::from_str(raw).expect("batch report is JSON")
    }
}

impl TestFixture {
    /// Create a new test fixture with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a test fixture with custom configuration.
    ///
    /// The engine's scratch directory is always redirected to a temp dir.
    pub fn with_config(mut config: Config) -> Self {
        let scratch = TempDir::new().expect("Failed to create scratch dir");
        config.engine = EngineConfig {
            scratch_dir: scratch.path().to_path_buf(),
            ..config.engine
        };

        let transcoder = Arc::new(MockTranscoder::new());
        let engine = JobEngine::new(config.engine.clone(), transcoder.clone())
            .with_margin(config.transcoder.margin);
        let state = Arc::new(AppState::new(config, Arc::new(engine)));

        Self {
            router: create_router(state),
            transcoder,
            scratch,
        }
    }

    /// Number of entries left under the scratch root.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path())
            .expect("scratch root exists")
            .count()
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a multipart POST request.
    pub async fn post_multipart(&self, path: &str, form: MultipartForm) -> TestResponse {
        self.post_multipart_body(path, form.finish()).await
    }

    /// Send a multipart POST with a pre-built body, closing boundary included or not.
    pub async fn post_multipart_body(&self, path: &str, body: Vec<u8>) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header("Content-Length", body.len())
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            bytes,
        }
    }
}

/// Minimal multipart/form-data body builder.
#[derive(Debug, Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, field: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, field, filename
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, field, value
            )
            .as_bytes(),
        );
        self
    }

    /// Watermark plus one `videos` part per filename, using fixture payloads.
    pub fn batch(filenames: &[&str]) -> Self {
        filenames.iter().fold(
            Self::new().file("watermark", "logo.png", fixtures::WATERMARK_BYTES),
            |form, name| form.file("videos", name, &fixtures::video_bytes(name)),
        )
    }

    /// The body without its closing boundary, as if the client hung up.
    pub fn truncated(self) -> Vec<u8> {
        self.body
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}
