//! Batch submission endpoint.

use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use watermarker_core::{
    BatchReport, BatchRequest, BatchResult, EngineError, Position, VideoAsset, WatermarkAsset,
};

use crate::metrics::UPLOAD_BYTES;
use crate::state::AppState;

/// Header carrying the compact JSON batch report on successful downloads.
pub const BATCH_REPORT_HEADER: &str = "x-batch-report";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Watermark a batch of uploaded videos.
///
/// Multipart fields:
/// - `watermark`: the image file (png, jpg, jpeg)
/// - `videos`: one field per video file (mp4, mkv, flv, avi)
/// - `position`: optional corner, defaults to `bottom-right`
pub async fn submit_batch(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    let request = match parse_batch_form(multipart).await {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.engine().submit(request).await {
        Ok(result) => batch_response(result),
        Err(EngineError::Validation(e)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn parse_batch_form(mut multipart: Multipart) -> Result<BatchRequest, Response> {
    let mut request = BatchRequest::default();
    let mut uploaded: usize = 0;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(error_response(e.status(), e.body_text())),
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "watermark" => {
                let (filename, bytes) = read_file(field).await?;
                uploaded += bytes.len();
                let asset = WatermarkAsset::new(filename, bytes)
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
                request.watermark = Some(asset);
            }
            "videos" | "videos[]" => {
                let (filename, bytes) = read_file(field).await?;
                uploaded += bytes.len();
                let asset = VideoAsset::new(filename, bytes)
                    .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
                request.videos.push(asset);
            }
            "position" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| error_response(e.status(), e.body_text()))?;
                if !text.trim().is_empty() {
                    request.position = text
                        .parse::<Position>()
                        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
                }
            }
            other => {
                warn!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    UPLOAD_BYTES.observe(uploaded as f64);
    Ok(request)
}

async fn read_file(field: Field<'_>) -> Result<(String, Vec<u8>), Response> {
    let filename = field
        .file_name()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("Field '{}' must be a file upload", field.name().unwrap_or("")),
            )
        })?;

    match field.bytes().await {
        Ok(bytes) => Ok((filename, bytes.to_vec())),
        Err(e) => Err(error_response(
            e.status(),
            format!("Failed to read file '{}': {}", filename, e.body_text()),
        )),
    }
}

fn batch_response(result: BatchResult) -> Response {
    let report = result.report();
    info!(
        batch_id = %report.batch_id,
        total = report.total,
        failed = report.failed,
        "Batch finished"
    );

    if result.succeeded() == 0 {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(report)).into_response();
    }

    let Some(report_value) = report_header(&report) else {
        // Too many failures to summarise in a header: the report becomes the body.
        warn!(
            batch_id = %report.batch_id,
            failed = report.failed,
            "Batch report does not fit in a header, returning it as the body"
        );
        return (StatusCode::MULTI_STATUS, Json(report)).into_response();
    };

    let Some(download) = result.into_primary_download() else {
        // Jobs succeeded but the archive could not be built.
        let error = report
            .archive_error
            .unwrap_or_else(|| "No download was produced".to_string());
        warn!(batch_id = %report.batch_id, error = %error, "Batch has no download");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, error);
    };

    let content_type = HeaderValue::from_str(&download.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = content_disposition(&download.filename);

    let mut response = Response::new(Body::from(download.bytes));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(BATCH_REPORT_HEADER, report_value);

    response
}

/// `Content-Disposition` for a download.
///
/// The quoted `filename` is always printable ASCII. Names that need more get
/// an RFC 6266 `filename*` parameter carrying the UTF-8 name.
fn content_disposition(filename: &str) -> HeaderValue {
    let mut fallback = String::with_capacity(filename.len());
    for c in filename.chars() {
        match c {
            '"' | '\\' => {
                fallback.push('\\');
                fallback.push(c);
            }
            ' '..='~' => fallback.push(c),
            _ => fallback.push('_'),
        }
    }

    let value = if filename.chars().all(|c| matches!(c, ' '..='~')) {
        format!("attachment; filename=\"{}\"", fallback)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(filename)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Longest error message kept per job in the report header.
const HEADER_MESSAGE_CHARS: usize = 256;

/// Upper bound on the encoded report header.
const MAX_REPORT_HEADER_BYTES: usize = 8 * 1024;

/// Compact, ASCII-only batch report for the `X-Batch-Report` header.
///
/// Error messages are shortened first. If the report is still too large only
/// the failed jobs are kept, with their error kind. `None` means even that
/// does not fit.
fn report_header(report: &BatchReport) -> Option<HeaderValue> {
    let mut compact = report.clone();
    for job in &mut compact.jobs {
        if let Some(error) = job.error.as_mut() {
            error.message = truncate_chars(&error.message, HEADER_MESSAGE_CHARS);
        }
    }
    if let Some(value) = encode_header(&compact) {
        return Some(value);
    }

    compact.jobs.retain(|job| job.error.is_some());
    for job in &mut compact.jobs {
        if let Some(error) = job.error.as_mut() {
            error.message.clear();
        }
    }
    encode_header(&compact)
}

fn encode_header(report: &BatchReport) -> Option<HeaderValue> {
    let json = ascii_json(report)?;
    if json.len() > MAX_REPORT_HEADER_BYTES {
        return None;
    }
    HeaderValue::from_str(&json).ok()
}

/// Serializes to JSON with every non-ASCII character written as a `\u` escape.
fn ascii_json<T: Serialize>(value: &T) -> Option<String> {
    let json = serde_json::to_string(value).ok()?;
    let mut escaped = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            escaped.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Some(escaped)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
