//! Supervision of a single transcoder process
//!
//! A `ProcessRunner` is built for one spawn and never reused. After
//! [`ProcessRunner::start`] a watcher task owns the child: it waits for the
//! process to exit (or for the runner to be cancelled, in which case it kills
//! and reaps it), drains the output readers, and then publishes the outcome
//! exactly once. Readers of the runner never block on the child.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::output::TailBuffer;
use super::CommandLine;
use crate::error::{Result, StreamError};

/// How long output readers may keep going once the process is reaped. A
/// grandchild that inherited the pipes can hold them open indefinitely.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How a runner's process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited on its own with status 0
    Success,
    /// Killed because the runner was closed
    Cancelled,
    /// Exited on its own with a failure status, or could not be waited on
    Failed(String),
    /// The process was never created
    SpawnFailed(String),
}

impl ExitOutcome {
    /// Whether the runner's owner should treat this as a crash
    pub fn is_error(&self) -> bool {
        matches!(self, ExitOutcome::Failed(_) | ExitOutcome::SpawnFailed(_))
    }

    fn from_status(status: std::io::Result<ExitStatus>) -> Self {
        match status {
            Ok(status) if status.success() => ExitOutcome::Success,
            Ok(status) => ExitOutcome::Failed(status.to_string()),
            Err(e) => ExitOutcome::Failed(format!("wait failed: {}", e)),
        }
    }
}

pub struct ProcessRunner {
    /// Stream name, for logging
    name: String,
    command: CommandLine,
    cancel: CancellationToken,
    output: Arc<Mutex<TailBuffer>>,
    error_tail_bytes: usize,
    /// Single-assignment terminal state, `None` while running
    exit: Arc<watch::Sender<Option<ExitOutcome>>>,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl ProcessRunner {
    pub fn new(
        name: impl Into<String>,
        command: CommandLine,
        capture_bytes: usize,
        error_tail_bytes: usize,
    ) -> Self {
        let (exit, _) = watch::channel(None);
        Self {
            name: name.into(),
            command,
            cancel: CancellationToken::new(),
            output: Arc::new(Mutex::new(TailBuffer::new(capture_bytes))),
            error_tail_bytes,
            exit: Arc::new(exit),
            started_at: Mutex::new(None),
        }
    }

    /// Spawn the process and its watcher. Must be called from within a tokio
    /// runtime and at most once.
    ///
    /// If the runner was closed before this call, nothing is spawned and the
    /// runner finishes as cancelled.
    pub fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::debug!("Stream {}: runner closed before spawn", self.name);
            self.finish(ExitOutcome::Cancelled);
            return Ok(());
        }

        let mut child = match Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                self.finish(ExitOutcome::SpawnFailed(source.to_string()));
                return Err(StreamError::Spawn {
                    program: self.command.program.clone(),
                    source,
                });
            }
        };

        *self.started_at.lock() = Some(Utc::now());
        tracing::info!(
            "Stream {}: started {} (pid {:?})",
            self.name,
            self.command.program,
            child.id()
        );

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_capture(stdout, Arc::clone(&self.output)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_capture(stderr, Arc::clone(&self.output)));
        }

        let cancel = self.cancel.clone();
        let exit = Arc::clone(&self.exit);
        let output = Arc::clone(&self.output);
        let name = self.name.clone();
        let error_tail_bytes = self.error_tail_bytes;

        tokio::spawn(async move {
            let outcome = tokio::select! {
                status = child.wait() => ExitOutcome::from_status(status),
                _ = cancel.cancelled() => {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!("Stream {}: kill failed: {}", name, e);
                    }
                    match child.wait().await {
                        Ok(_) => ExitOutcome::Cancelled,
                        Err(e) => ExitOutcome::Failed(format!("wait failed: {}", e)),
                    }
                }
            };

            // the captured tail must be complete before anyone can see the exit
            let drained = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, async {
                for reader in readers.iter_mut() {
                    let _ = reader.await;
                }
            })
            .await;
            if drained.is_err() {
                tracing::debug!("Stream {}: output still open after exit, detaching", name);
                for reader in &readers {
                    reader.abort();
                }
            }

            match &outcome {
                ExitOutcome::Cancelled => tracing::info!("Stream {}: stopped", name),
                ExitOutcome::Success => tracing::info!("Stream {}: finished", name),
                _ => tracing::warn!(
                    "Stream {}: exited ({:?}): {}",
                    name,
                    outcome,
                    output.lock().tail(error_tail_bytes)
                ),
            }

            exit.send_if_modified(|slot| {
                if slot.is_none() {
                    *slot = Some(outcome);
                    true
                } else {
                    false
                }
            });
        });

        Ok(())
    }

    /// False once the watcher has observed exit. Never blocks on the child.
    pub fn is_running(&self) -> bool {
        self.exit.borrow().is_none()
    }

    /// Outcome of the process, `None` while it is still running
    pub fn outcome(&self) -> Option<ExitOutcome> {
        self.exit.borrow().clone()
    }

    /// When the process was spawned, if it was
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.lock()
    }

    /// Captured diagnostic of a terminated process.
    ///
    /// `None` while running, and for a process that ended without output and
    /// without a failure status.
    pub fn last_error(&self) -> Option<String> {
        let outcome = self.outcome()?;
        let tail = self.output.lock().tail(self.error_tail_bytes);
        if !tail.is_empty() {
            return Some(tail);
        }
        match outcome {
            ExitOutcome::Failed(detail) | ExitOutcome::SpawnFailed(detail) => Some(detail),
            ExitOutcome::Success | ExitOutcome::Cancelled => None,
        }
    }

    /// Cancel the process if it is still alive and wait until it is reaped.
    ///
    /// Idempotent; every caller receives the same outcome.
    pub async fn close(&self) -> ExitOutcome {
        self.cancel.cancel();
        let mut rx = self.exit.subscribe();
        // the sender lives in self, so the channel cannot close while we wait
        let outcome = rx.wait_for(|outcome| outcome.is_some()).await.ok();
        outcome
            .and_then(|outcome| outcome.clone())
            .unwrap_or(ExitOutcome::Cancelled)
    }

    /// Give up on a runner that was never started, releasing any `close`
    /// waiters
    pub fn abandon(&self) {
        self.cancel.cancel();
        self.finish(ExitOutcome::Cancelled);
    }

    /// Record a terminal state without a watcher (spawn skipped or failed)
    fn finish(&self, outcome: ExitOutcome) {
        self.exit.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(outcome);
                true
            } else {
                false
            }
        });
    }
}

impl std::fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("name", &self.name)
            .field("program", &self.command.program)
            .field("outcome", &self.outcome())
            .finish()
    }
}

fn spawn_capture<R>(mut reader: R, output: Arc<Mutex<TailBuffer>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => output.lock().push(&buf[..n]),
            }
        }
    })
}
