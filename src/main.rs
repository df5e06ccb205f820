//! Stream Manager
//!
//! Supervises named ffmpeg restreaming jobs. Each stream reads a file or URL,
//! optionally seeks and selects channels, and republishes the result under a
//! common RTSP base. Stream definitions can be persisted so they survive a
//! restart; a small JSON API launches, starts, stops and removes them.

mod config;
mod config_file;
mod error;
mod ffmpeg;
mod http;
mod registry;
mod state;
mod store;
mod stream;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::error::{Result, StreamError};
use crate::http::create_router;
use crate::state::AppState;
use crate::store::{FileStore, StreamStore};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "stream-manager";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let (config, warning) = config_file::load_server_config(&config_path);

    init_logging(&config);
    if let Some(warning) = warning {
        tracing::warn!("{}", warning);
    }

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    config.validate()?;
    tracing::info!("Configuration loaded: {:?}", config);

    let ffmpeg_version = ffmpeg::check_tools(&config.transcoder).await?;
    tracing::info!("FFmpeg version: {}", ffmpeg_version);

    let store: Option<Arc<dyn StreamStore>> = match &config.store_dir {
        Some(dir) => Some(Arc::new(FileStore::open(dir)?)),
        None => {
            tracing::info!("No store configured, streams are kept in memory only");
            None
        }
    };

    // Create application state; this restores persisted streams
    let state = Arc::new(AppState::new(config.clone(), store, ffmpeg_version));

    // Build router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| StreamError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Transcoders are left running on purpose: they are independent
    // processes and the store lets a new instance pick the streams up again.
    tracing::info!("Server stopped");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "stream_manager={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    let (pretty, json) = if config.json_logs() {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate() => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
