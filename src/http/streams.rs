//! Stream management handlers
//!
//! Handles stream launch, listing, start/stop, deletion and source probing.
//! Every handler is a thin wrapper over the registry; errors map to status
//! codes through `StreamError`'s `IntoResponse`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::ffmpeg::probe;
use crate::registry::StreamView;
use crate::state::AppState;
use crate::stream::StreamEntry;

/// List of managed streams
#[derive(Debug, Serialize)]
pub struct StreamListResponse {
    pub count: usize,
    pub streams: Vec<StreamView>,
}

/// Request to probe a source before launching it
#[derive(Debug, Deserialize)]
pub struct ProbeRequest {
    pub source: String,
}

/// Register a new stream without starting it
/// POST /streams
pub async fn launch_stream(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<StreamEntry>,
) -> Result<impl IntoResponse> {
    let view = state.registry.launch(entry)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// List all streams
/// GET /streams
pub async fn list_streams(State(state): State<Arc<AppState>>) -> Json<StreamListResponse> {
    let streams = state.registry.list();
    Json(StreamListResponse {
        count: streams.len(),
        streams,
    })
}

/// Get stream details
/// GET /streams/{name}
pub async fn get_stream(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<StreamView>> {
    Ok(Json(state.registry.get(&name)?))
}

/// Delete a stream, stopping its process
/// DELETE /streams/{name}
pub async fn delete_stream(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    state.registry.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /streams/{name}/start
pub async fn start_stream(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<StreamView>> {
    state.registry.start(&name)?;
    tracing::info!("Stream {}: started", name);
    Ok(Json(state.registry.get(&name)?))
}

/// POST /streams/{name}/stop
pub async fn stop_stream(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<StreamView>> {
    state.registry.stop(&name).await?;
    tracing::info!("Stream {}: stopped", name);
    Ok(Json(state.registry.get(&name)?))
}

/// Describe a source's format and streams
/// POST /probe
pub async fn probe_source(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProbeRequest>,
) -> Result<Json<serde_json::Value>> {
    let transcoder = &state.config.transcoder;
    let info = probe(
        &transcoder.probe_command,
        &request.source,
        Duration::from_secs(transcoder.probe_timeout_secs),
    )
    .await?;
    Ok(Json(info))
}
