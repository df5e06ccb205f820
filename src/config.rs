//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, StreamError};

/// External transcoder and probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Transcoder command line; the first element is the program, the rest
    /// are prepended to every generated argument vector
    pub command: Vec<String>,

    /// Probe command line, same layout as `command`
    pub probe_command: Vec<String>,

    /// Bytes of combined stdout/stderr retained per runner
    pub capture_bytes: usize,

    /// Bytes of diagnostic tail reported in stream status
    pub error_tail_bytes: usize,

    /// Upper bound on a single probe invocation in seconds
    pub probe_timeout_secs: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            command: vec!["ffmpeg".to_string()],
            probe_command: vec!["ffprobe".to_string()],
            capture_bytes: 4096,
            error_tail_bytes: 128,
            probe_timeout_secs: 30,
        }
    }
}

impl TranscoderConfig {
    /// Reject command lines that cannot be executed
    pub fn validate(&self) -> Result<()> {
        if self.command.first().is_none_or(|p| p.is_empty()) {
            return Err(StreamError::Config("transcoder command is empty".into()));
        }
        if self.probe_command.first().is_none_or(|p| p.is_empty()) {
            return Err(StreamError::Config("probe command is empty".into()));
        }
        if self.error_tail_bytes == 0 || self.capture_bytes < self.error_tail_bytes {
            return Err(StreamError::Config(format!(
                "capture_bytes ({}) must be at least error_tail_bytes ({}) and non-zero",
                self.capture_bytes, self.error_tail_bytes
            )));
        }
        Ok(())
    }
}

/// HTTP basic auth credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Output base every stream publishes under (rtsp/rtsps/etc)
    pub target: String,

    /// Transcoder configuration
    pub transcoder: TranscoderConfig,

    /// Directory for persisted stream definitions; in-memory only when unset
    pub store_dir: Option<PathBuf>,

    /// Basic auth for the control API; open when unset
    pub auth: Option<AuthConfig>,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            target: "rtsp://localhost".to_string(),
            transcoder: TranscoderConfig::default(),
            store_dir: None,
            auth: None,
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether logs should be emitted as JSON lines
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Check the settings that would otherwise fail at first use
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(StreamError::Config("target is empty".into()));
        }
        self.transcoder.validate()
    }
}
