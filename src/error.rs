use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;

/// Main error type for the stream manager
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Invalid stream configuration: {0}")]
    Validation(String),

    #[error("Stream name already exists: {0}")]
    DuplicateName(String),

    #[error("Stream not found: {0}")]
    NotFound(String),

    #[error("Stream already started: {0}")]
    AlreadyRunning(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// HTTP status the control API answers with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            StreamError::Validation(_) | StreamError::Probe(_) => StatusCode::BAD_REQUEST,
            StreamError::DuplicateName(_) | StreamError::AlreadyRunning(_) => StatusCode::CONFLICT,
            StreamError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, StreamError>;
