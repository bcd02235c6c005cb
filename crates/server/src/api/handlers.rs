use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use watermarker_core::{Config, PoolStatus, Position};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<PoolStatus> {
    Json(state.engine().status())
}

#[derive(Debug, Serialize)]
pub struct PositionInfo {
    pub position: Position,
    pub label: &'static str,
    /// FFmpeg overlay expression for the engine's configured margin.
    pub expression: String,
}

pub async fn list_positions(State(state): State<Arc<AppState>>) -> Json<Vec<PositionInfo>> {
    let margin = state.engine().margin();
    let positions = Position::ALL
        .into_iter()
        .map(|position| PositionInfo {
            position,
            label: position.label(),
            expression: position.overlay_expr(margin).to_string(),
        })
        .collect();
    Json(positions)
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
