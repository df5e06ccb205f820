//! Service-level handlers

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Health check endpoint
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub ffmpeg: String,
}

/// Version endpoint
/// GET /version
pub async fn version_check(State(state): State<Arc<AppState>>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: concat!("stream-manager v", env!("CARGO_PKG_VERSION")),
        ffmpeg: state.ffmpeg_version.clone(),
    })
}
