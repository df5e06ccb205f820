//! Application state management
//!
//! `AppState` is what the HTTP handlers share: the stream registry, the
//! configuration it was built from, and the transcoder version discovered at
//! startup.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::registry::StreamRegistry;
use crate::store::StreamStore;

/// Application state shared across all handlers
pub struct AppState {
    /// Streams under management
    pub registry: StreamRegistry,

    /// Server configuration
    pub config: ServerConfig,

    /// First line of the transcoder's `-version` output
    pub ffmpeg_version: String,
}

impl AppState {
    /// Create the state, restoring persisted streams from `store` if given
    pub fn new(
        config: ServerConfig,
        store: Option<Arc<dyn StreamStore>>,
        ffmpeg_version: impl Into<String>,
    ) -> Self {
        let registry =
            StreamRegistry::new(config.target.clone(), config.transcoder.clone(), store);
        Self {
            registry,
            config,
            ffmpeg_version: ffmpeg_version.into(),
        }
    }

    /// State with default configuration and no store
    #[cfg(test)]
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default(), None, "")
    }
}
