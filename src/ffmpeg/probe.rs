//! Source inspection with ffprobe
//!
//! Advisory only: probing never touches the registry. Callers use the result
//! to pick channel indices before launching a stream.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::CommandLine;
use crate::error::{Result, StreamError};

/// Run `ffprobe -v quiet -print_format json -show_format -show_streams` on
/// `source` and return the parsed document
pub async fn probe(command: &[String], source: &str, timeout: Duration) -> Result<serde_json::Value> {
    if source.trim().is_empty() {
        return Err(StreamError::Validation("no source".into()));
    }
    let cmd = CommandLine::from_config(
        command,
        vec![
            "-v".into(),
            "quiet".into(),
            "-print_format".into(),
            "json".into(),
            "-show_format".into(),
            "-show_streams".into(),
            source.to_string(),
        ],
    )?;

    let run = Command::new(&cmd.program)
        .args(&cmd.args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();
    let output = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| StreamError::Probe(format!("timed out after {:?}", timeout)))?
        .map_err(|source| StreamError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        return Err(StreamError::Probe(if detail.is_empty() {
            format!("{} exited with {}", cmd.program, output.status)
        } else {
            detail.to_string()
        }));
    }

    serde_json::from_slice(&output.stdout)
        .map_err(|e| StreamError::Probe(format!("invalid probe output: {}", e)))
}
