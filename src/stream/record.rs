//! A named stream and its runner slot

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::entry::StreamEntry;
use crate::config::TranscoderConfig;
use crate::error::{Result, StreamError};
use crate::ffmpeg::{build_args, CommandLine, ProcessRunner};

/// Observable state of a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum StreamStatus {
    /// Never started, stopped, or ended without a diagnostic
    Stopped,
    /// A runner is present and its process is alive
    Running,
    /// The process terminated on its own and left a diagnostic
    Errored(String),
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamStatus::Stopped => write!(f, "Stopped"),
            StreamStatus::Running => write!(f, "Running"),
            StreamStatus::Errored(detail) => write!(f, "Error: {}", detail),
        }
    }
}

/// Holder of the current runner, replaced only through [`swap`] and
/// [`compare_and_swap`].
///
/// The lock is per stream and never held across an await, so two streams
/// never contend.
///
/// [`swap`]: RunnerSlot::swap
/// [`compare_and_swap`]: RunnerSlot::compare_and_swap
#[derive(Debug, Default)]
pub struct RunnerSlot {
    inner: Mutex<Option<Arc<ProcessRunner>>>,
}

impl RunnerSlot {
    pub fn load(&self) -> Option<Arc<ProcessRunner>> {
        self.inner.lock().clone()
    }

    pub fn swap(&self, new: Option<Arc<ProcessRunner>>) -> Option<Arc<ProcessRunner>> {
        std::mem::replace(&mut *self.inner.lock(), new)
    }

    /// Install `new` if the slot still holds `current` (compared by
    /// identity). On mismatch the actual content is returned.
    pub fn compare_and_swap(
        &self,
        current: Option<&Arc<ProcessRunner>>,
        new: Option<Arc<ProcessRunner>>,
    ) -> std::result::Result<(), Option<Arc<ProcessRunner>>> {
        let mut slot = self.inner.lock();
        let same = match (slot.as_ref(), current) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        if same {
            *slot = new;
            Ok(())
        } else {
            Err(slot.clone())
        }
    }
}

/// One supervised stream: immutable configuration plus its runner slot
#[derive(Debug)]
pub struct Stream {
    entry: StreamEntry,
    target: String,
    runner: RunnerSlot,
    /// Set once the stream has been removed from its registry
    retired: AtomicBool,
}

impl Stream {
    /// Validate `entry` and bind it to the output base `target`
    pub fn new(entry: StreamEntry, target: impl Into<String>) -> Result<Self> {
        entry.validate()?;
        let target = target.into();
        if target.is_empty() {
            return Err(StreamError::Validation("no target".into()));
        }
        Ok(Self {
            entry,
            target,
            runner: RunnerSlot::default(),
            retired: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn entry(&self) -> &StreamEntry {
        &self.entry
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Start a transcoder unless one is already alive.
    ///
    /// The new runner is installed before anything is spawned, so of two
    /// racing calls only the one whose compare-and-swap lands spawns a
    /// process; the other sees a live runner and fails with
    /// `AlreadyRunning`. A terminated runner is simply replaced.
    pub fn start(&self, transcoder: &TranscoderConfig) -> Result<()> {
        if self.is_retired() {
            return Err(StreamError::NotFound(self.name().to_string()));
        }
        let command = CommandLine::from_config(&transcoder.command, build_args(self))?;
        let runner = Arc::new(ProcessRunner::new(
            self.name(),
            command,
            transcoder.capture_bytes,
            transcoder.error_tail_bytes,
        ));

        let mut current = self.runner.load();
        loop {
            if current.as_ref().is_some_and(|r| r.is_running()) {
                return Err(StreamError::AlreadyRunning(self.name().to_string()));
            }
            match self
                .runner
                .compare_and_swap(current.as_ref(), Some(Arc::clone(&runner)))
            {
                Ok(()) => break,
                Err(actual) => current = actual,
            }
        }

        // A retire that ran before the install above could not see this
        // runner; take it back out so no process outlives the stream.
        if self.is_retired() {
            let _ = self.runner.compare_and_swap(Some(&runner), None);
            runner.abandon();
            return Err(StreamError::NotFound(self.name().to_string()));
        }

        if let Err(e) = runner.start() {
            // leave no runner behind for a process that never existed
            let _ = self.runner.compare_and_swap(Some(&runner), None);
            return Err(e);
        }
        Ok(())
    }

    /// Detach the runner and wait for its process to be reaped.
    ///
    /// Stopping a stream that is not running is a no-op. A kill issued here is
    /// expected and never reported as a failure.
    pub async fn stop(&self) {
        let Some(runner) = self.runner.swap(None) else {
            return;
        };
        let outcome = runner.close().await;
        if outcome.is_error() {
            tracing::debug!("Stream {}: had already failed: {:?}", self.name(), outcome);
        } else {
            tracing::debug!("Stream {}: closed ({:?})", self.name(), outcome);
        }
    }

    /// Stop the stream for good: later starts fail with `NotFound`
    pub async fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
        self.stop().await;
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> StreamStatus {
        match self.runner.load() {
            Some(runner) if runner.is_running() => StreamStatus::Running,
            Some(runner) => match runner.last_error() {
                Some(detail) => StreamStatus::Errored(detail),
                None => StreamStatus::Stopped,
            },
            None => StreamStatus::Stopped,
        }
    }

    /// Spawn time of the runner currently in the slot
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.runner.load().and_then(|r| r.started_at())
    }

    #[cfg(test)]
    pub(crate) fn runner(&self) -> Option<Arc<ProcessRunner>> {
        self.runner.load()
    }
}
