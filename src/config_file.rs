//! Configuration file support
//!
//! Loads server configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{AuthConfig, ServerConfig, TranscoderConfig};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Transcoder settings
    pub transcoder: Option<TranscoderSettings>,
    /// Persistence settings
    pub store: Option<StoreSettings>,
    /// Basic auth settings
    pub auth: Option<AuthSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Remote stream server to publish to
    pub target: Option<String>,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            target: None,
            cors_enabled: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderSettings {
    /// Transcoder program followed by prefix arguments
    pub command: Option<Vec<String>>,
    /// Probe program followed by prefix arguments
    pub probe_command: Option<Vec<String>>,
    /// Retained output per runner in bytes
    pub capture_bytes: Option<usize>,
    /// Diagnostic tail shown in status in bytes
    pub error_tail_bytes: Option<usize>,
    /// Probe timeout in seconds
    pub probe_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Directory holding one JSON document per stream
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    #[cfg(test)]
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Convert to ServerConfig, filling gaps with defaults
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        let transcoder = match self.transcoder {
            Some(t) => {
                let base = TranscoderConfig::default();
                TranscoderConfig {
                    command: t.command.unwrap_or(base.command),
                    probe_command: t.probe_command.unwrap_or(base.probe_command),
                    capture_bytes: t.capture_bytes.unwrap_or(base.capture_bytes),
                    error_tail_bytes: t.error_tail_bytes.unwrap_or(base.error_tail_bytes),
                    probe_timeout_secs: t.probe_timeout_secs.unwrap_or(base.probe_timeout_secs),
                }
            }
            None => defaults.transcoder,
        };

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            target: self.server.target.unwrap_or(defaults.target),
            transcoder,
            store_dir: self.store.map(|s| s.dir),
            auth: self.auth.map(|a| AuthConfig {
                username: a.username,
                password: a.password,
            }),
            cors_enabled: self.server.cors_enabled.unwrap_or(defaults.cors_enabled),
            log_level: self
                .logging
                .as_ref()
                .map(|l| l.level.clone())
                .unwrap_or(defaults.log_level),
            log_format: self
                .logging
                .and_then(|l| l.format)
                .unwrap_or(defaults.log_format),
        }
    }
}

/// Load the server configuration from `path`, falling back to defaults when
/// the file is absent or unreadable. The second value carries the reason a
/// present file was ignored so the caller can log it once logging is up.
pub fn load_server_config<P: AsRef<Path>>(path: P) -> (ServerConfig, Option<String>) {
    let path = path.as_ref();
    if !path.exists() {
        return (ServerConfig::default(), None);
    }
    match ConfigFile::from_file(path) {
        Ok(cf) => (cf.into_server_config(), None),
        Err(e) => (
            ServerConfig::default(),
            Some(format!(
                "Failed to load config file {}: {}. Using defaults.",
                path.display(),
                e
            )),
        ),
    }
}
