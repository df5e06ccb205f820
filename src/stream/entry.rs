//! Stream definitions as launched by callers and persisted in the store

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::{Result, StreamError};

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap())
}

/// Configuration of one named stream.
///
/// The output target is not part of the entry: the registry supplies it when
/// the stream is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    /// Unique identifier, `[a-zA-Z0-9_-]+`
    pub name: String,

    /// Input file path or network URL
    pub source: String,

    /// Seek position in the source, in seconds on the wire
    #[serde(default, rename = "startpos", with = "seconds")]
    pub start_position: Duration,

    /// Video stream index to map, unset keeps ffmpeg's default selection
    #[serde(default, with = "channel")]
    pub video: Option<u32>,

    /// Audio stream index to map
    #[serde(default, with = "channel")]
    pub audio: Option<u32>,

    /// Subtitle stream index to burn in
    #[serde(default, with = "channel")]
    pub subtitle: Option<u32>,

    /// Read pacing as a percentage of real time, never below 100
    #[serde(default, rename = "readrate", skip_serializing_if = "Option::is_none")]
    pub read_rate: Option<u32>,
}

impl StreamEntry {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            start_position: Duration::ZERO,
            video: None,
            audio: None,
            subtitle: None,
            read_rate: None,
        }
    }

    /// Reject malformed entries before any state changes
    pub fn validate(&self) -> Result<()> {
        if !name_pattern().is_match(&self.name) {
            return Err(StreamError::Validation(format!(
                "invalid name: {:?}",
                self.name
            )));
        }
        if self.source.trim().is_empty() {
            return Err(StreamError::Validation("no source".into()));
        }
        Ok(())
    }
}

/// `Duration` as fractional seconds
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "start position must be a non-negative number of seconds, got {}",
                secs
            )));
        }
        Duration::try_from_secs_f64(secs).map_err(|e| {
            serde::de::Error::custom(format!("start position {} out of range: {}", secs, e))
        })
    }
}

/// Channel selector: null or any negative integer means unset
mod channel {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(index) => serializer.serialize_u32(*index),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        match Option::<i64>::deserialize(deserializer)? {
            Some(index) if index >= 0 => u32::try_from(index)
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("channel index {} out of range", index))),
            _ => Ok(None),
        }
    }
}
