//! FFmpeg module - everything that talks to the external ffmpeg binaries
//!
//! This module handles:
//! - Argument construction for a stream
//! - Supervising one transcoder process per start
//! - Bounded capture of process output
//! - Probing sources with ffprobe

pub mod args;
pub mod output;
pub mod probe;
pub mod runner;

pub use args::build_args;
pub use probe::probe;
pub use runner::ProcessRunner;

use std::process::Stdio;
use tokio::process::Command;

use crate::config::TranscoderConfig;
use crate::error::{Result, StreamError};

/// A program plus the arguments to run it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Split a configured command (`["nice", "-n", "10", "ffmpeg"]`) and
    /// append `extra` after its prefix arguments
    pub fn from_config(command: &[String], extra: Vec<String>) -> Result<Self> {
        let (program, prefix) = command
            .split_first()
            .ok_or_else(|| StreamError::Config("empty command".into()))?;
        let mut args = prefix.to_vec();
        args.extend(extra);
        Ok(Self {
            program: program.clone(),
            args,
        })
    }
}

/// First line of `<command> -version`, e.g. `ffmpeg version 6.1.1 ...`
pub async fn version_info(command: &[String]) -> Result<String> {
    let cmd = CommandLine::from_config(command, vec!["-version".into()])?;
    let output = Command::new(&cmd.program)
        .args(&cmd.args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| StreamError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(StreamError::Config(format!(
            "{} -version exited with {}",
            cmd.program, output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

/// Make sure both the transcoder and the probe run, returning the
/// transcoder's version line
pub async fn check_tools(transcoder: &TranscoderConfig) -> Result<String> {
    let version = version_info(&transcoder.command).await?;
    let probe_version = version_info(&transcoder.probe_command).await?;
    tracing::debug!("Probe version: {}", probe_version);
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_plain() {
        let cmd = CommandLine::from_config(&["ffmpeg".to_string()], vec!["-i".into(), "x".into()])
            .unwrap();
        assert_eq!(cmd.program, "ffmpeg");
        assert_eq!(cmd.args, vec!["-i", "x"]);
    }

    #[test]
    fn test_command_line_with_wrapper() {
        let command: Vec<String> = ["nice", "-n", "10", "ffmpeg"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cmd = CommandLine::from_config(&command, vec!["-version".into()]).unwrap();
        assert_eq!(cmd.program, "nice");
        assert_eq!(cmd.args, vec!["-n", "10", "ffmpeg", "-version"]);
    }

    #[test]
    fn test_command_line_empty() {
        assert!(CommandLine::from_config(&[], vec![]).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_info_first_line() {
        let command: Vec<String> = vec![
            "sh".into(),
            "-c".into(),
            "echo 'fakempeg version 1.0'; echo 'built with sh'".into(),
        ];
        assert_eq!(version_info(&command).await.unwrap(), "fakempeg version 1.0");
    }

    #[tokio::test]
    async fn test_version_info_missing_binary() {
        let command = vec!["/nonexistent/ffmpeg".to_string()];
        assert!(matches!(
            version_info(&command).await,
            Err(StreamError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_tools_requires_probe() {
        let transcoder = TranscoderConfig {
            command: vec!["sh".into(), "-c".into(), "echo 'fakempeg version 1.0'".into()],
            probe_command: vec!["/nonexistent/ffprobe".into()],
            ..Default::default()
        };
        assert!(matches!(
            check_tools(&transcoder).await,
            Err(StreamError::Spawn { .. })
        ));

        let transcoder = TranscoderConfig {
            probe_command: vec!["sh".into(), "-c".into(), "echo 'fakeprobe version 1.0'".into()],
            ..transcoder
        };
        assert_eq!(check_tools(&transcoder).await.unwrap(), "fakempeg version 1.0");
    }
}
