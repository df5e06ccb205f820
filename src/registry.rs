//! Stream registry
//!
//! The registry maps stream names to streams and mirrors their definitions
//! into an optional durable store. It holds no lock across streams: the map is
//! sharded, and all start/stop contention is confined to one stream's runner
//! slot. The store is best effort; in-memory state is authoritative and a
//! failed write never undoes the operation it accompanied.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::config::TranscoderConfig;
use crate::error::{Result, StreamError};
use crate::ffmpeg::args::output_url;
use crate::store::{StoreError, StreamStore};
use crate::stream::{Stream, StreamEntry, StreamStatus};

/// Presentation of one stream: its definition and current status
#[derive(Debug, Clone, Serialize)]
pub struct StreamView {
    #[serde(flatten)]
    pub entry: StreamEntry,
    /// Where the stream is published
    pub output: String,
    pub status: StreamStatus,
    /// Spawn time of the current process, if one was spawned
    pub started_at: Option<DateTime<Utc>>,
}

impl StreamView {
    fn new(stream: &Stream) -> Self {
        Self {
            entry: stream.entry().clone(),
            output: output_url(stream.target(), stream.name()),
            status: stream.status(),
            started_at: stream.started_at(),
        }
    }
}

/// Outcome of restoring persisted streams
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReloadReport {
    pub loaded: usize,
    pub failed: usize,
}

pub struct StreamRegistry {
    streams: DashMap<String, Arc<Stream>>,
    store: Option<Arc<dyn StreamStore>>,
    target: String,
    transcoder: TranscoderConfig,
}

impl StreamRegistry {
    /// Create a registry publishing under `target`.
    ///
    /// With a store, every persisted stream is launched again (not started)
    /// before the registry is returned.
    pub fn new(
        target: impl Into<String>,
        transcoder: TranscoderConfig,
        store: Option<Arc<dyn StreamStore>>,
    ) -> Self {
        let registry = Self {
            streams: DashMap::new(),
            store,
            target: target.into(),
            transcoder,
        };
        if registry.store.is_some() {
            let report = registry.reload();
            tracing::info!(
                "Restored {} stream(s) from store, {} failed",
                report.loaded,
                report.failed
            );
        }
        registry
    }

    /// Register a new stream without starting it, persisting its definition
    pub fn launch(&self, entry: StreamEntry) -> Result<StreamView> {
        let stream = self.launch_internal(entry)?;
        self.persist(stream.entry());
        tracing::info!("Stream {}: launched from {}", stream.name(), stream.entry().source);
        Ok(StreamView::new(&stream))
    }

    fn launch_internal(&self, entry: StreamEntry) -> Result<Arc<Stream>> {
        let stream = Arc::new(Stream::new(entry, self.target.clone())?);
        match self.streams.entry(stream.name().to_string()) {
            Entry::Occupied(_) => Err(StreamError::DuplicateName(stream.name().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&stream));
                Ok(stream)
            }
        }
    }

    /// Start the stream's transcoder unless it is already running
    pub fn start(&self, name: &str) -> Result<()> {
        self.lookup(name)?.start(&self.transcoder)
    }

    /// Stop the stream's transcoder and wait for it to exit; a no-op for a
    /// stream that is not running
    pub async fn stop(&self, name: &str) -> Result<()> {
        let stream = self.lookup(name)?;
        stream.stop().await;
        Ok(())
    }

    /// Forget the stream, drop its persisted definition and stop it
    pub async fn delete(&self, name: &str) -> Result<()> {
        let (_, stream) = self
            .streams
            .remove(name)
            .ok_or_else(|| StreamError::NotFound(name.to_string()))?;
        if let Some(store) = &self.store {
            if let Err(e) = store.delete(name) {
                tracing::warn!("Error while deleting stream {} from store: {}", name, e);
            }
        }
        stream.retire().await;
        tracing::info!("Stream {}: deleted", name);
        Ok(())
    }

    #[cfg(test)]
    pub fn status(&self, name: &str) -> Result<StreamStatus> {
        Ok(self.lookup(name)?.status())
    }

    pub fn get(&self, name: &str) -> Result<StreamView> {
        let stream = self.lookup(name)?;
        Ok(StreamView::new(&stream))
    }

    /// All streams, sorted by name
    pub fn list(&self) -> Vec<StreamView> {
        let streams: Vec<Arc<Stream>> = self.streams.iter().map(|r| Arc::clone(r.value())).collect();
        let mut views: Vec<StreamView> = streams.iter().map(|s| StreamView::new(s)).collect();
        views.sort_by(|a, b| a.entry.name.cmp(&b.entry.name));
        views
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Launch every persisted stream without re-persisting it.
    ///
    /// Meant for startup. A broken entry is logged and skipped so it cannot
    /// keep the others from loading.
    pub fn reload(&self) -> ReloadReport {
        let mut report = ReloadReport::default();
        let Some(store) = &self.store else {
            return report;
        };
        let keys = match store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to list persisted streams: {}", e);
                return report;
            }
        };
        for key in keys {
            match self.restore(store.as_ref(), &key) {
                Ok(()) => report.loaded += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("Error while restoring stream {}: {}", key, e);
                }
            }
        }
        report
    }

    fn restore(&self, store: &dyn StreamStore, key: &str) -> Result<()> {
        let data = store
            .get(key)?
            .ok_or_else(|| StreamError::NotFound(key.to_string()))?;
        let entry: StreamEntry = serde_json::from_slice(&data)
            .map_err(|e| StreamError::Validation(format!("corrupt entry: {}", e)))?;
        if entry.name != key {
            return Err(StreamError::Validation(format!(
                "entry is named {:?}",
                entry.name
            )));
        }
        self.launch_internal(entry)?;
        Ok(())
    }

    fn persist(&self, entry: &StreamEntry) {
        let Some(store) = &self.store else {
            return;
        };
        let result = serde_json::to_vec(entry)
            .map_err(StoreError::from)
            .and_then(|data| store.put(&entry.name, &data));
        if let Err(e) = result {
            tracing::warn!("Error while saving stream {} to store: {}", entry.name, e);
        }
    }

    fn lookup(&self, name: &str) -> Result<Arc<Stream>> {
        self.streams
            .get(name)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| StreamError::NotFound(name.to_string()))
    }
}
