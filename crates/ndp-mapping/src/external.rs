//! External statistical computation boundary
//!
//! The computation itself is an opaque subprocess that reads the input
//! table from the working directory and leaves its result files in the data
//! directory. This module wraps the invocation in a structured result and
//! models the best-effort environment probes as plain `Option`s, so their
//! non-fatal contract is visible in the type.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming the execution-metadata file, when the
/// platform provides one
pub const TASK_METADATA_ENV: &str = "NDP_TASK_METADATA_FILE";

/// The external command to invoke
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    /// No timeout when absent (the upstream tool imposes none); expiry is
    /// reported as a computation failure
    pub timeout: Option<Duration>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Parse a whitespace-separated command line
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .context("External command cannot be empty")?
            .to_string();
        Ok(Self::new(program, parts.map(String::from).collect()))
    }

    /// Run the command to completion in `workdir`.
    ///
    /// Blocks until the subprocess exits (or the timeout expires, which is
    /// an error); the produced-files manifest lists `data_dir` afterwards.
    pub async fn run(&self, workdir: &Path, data_dir: &Path) -> Result<ExternalResult> {
        info!(program = %self.program, "Launching external computation");

        let output = {
            let mut command = tokio::process::Command::new(&self.program);
            command
                .args(&self.args)
                .current_dir(workdir)
                .kill_on_drop(true);
            let future = command.output();

            match self.timeout {
                Some(timeout) => tokio::time::timeout(timeout, future)
                    .await
                    .map_err(|_| {
                        anyhow::anyhow!(
                            "External computation timed out after {}s",
                            timeout.as_secs()
                        )
                    })?,
                None => future.await,
            }
        }
        .with_context(|| format!("Failed to launch {}", self.program))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        for line in stdout.lines().chain(stderr.lines()) {
            debug!(target: "external", "{}", line);
        }

        let produced_files = list_files(data_dir);
        info!(exit_code = exit_code, files = produced_files.len(), "External computation exited");

        Ok(ExternalResult {
            exit_code,
            stdout,
            stderr,
            produced_files,
        })
    }
}

/// Structured outcome of one external invocation
#[derive(Debug, Clone)]
pub struct ExternalResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Files present in the data directory after exit
    pub produced_files: Vec<PathBuf>,
}

impl ExternalResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

/// Probe the external tool's version.
///
/// Best effort: any failure is logged and reported as absence, never as an
/// error.
pub async fn probe_tool_version(command: &ExternalCommand) -> Option<String> {
    let output = tokio::process::Command::new(&command.program)
        .args(&command.args)
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("")
                .trim()
                .to_string();
            if version.is_empty() {
                None
            } else {
                Some(version)
            }
        },
        Ok(output) => {
            warn!(exit_code = ?output.status.code(), "Tool version probe failed");
            None
        },
        Err(e) => {
            warn!(error = %e, "Tool version probe failed");
            None
        },
    }
}

/// Read the execution-environment metadata the platform exposes.
///
/// Best effort: absence of the variable, an unreadable file, or malformed
/// JSON all report as `None`.
pub fn execution_metadata() -> Option<String> {
    let path = std::env::var(TASK_METADATA_ENV).ok()?;
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path, error = %e, "Failed to read task metadata");
            return None;
        },
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(_) => Some(raw),
        Err(e) => {
            warn!(path = %path, error = %e, "Task metadata is not valid JSON");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_command_line() {
        let command = ExternalCommand::parse("Rscript pipeline.R --quiet").unwrap();
        assert_eq!(command.program, "Rscript");
        assert_eq!(command.args, vec!["pipeline.R", "--quiet"]);
        assert!(command.timeout.is_none());
    }

    #[test]
    fn test_parse_empty_command_line_fails() {
        assert!(ExternalCommand::parse("   ").is_err());
    }

    #[tokio::test]
    async fn test_run_captures_exit_code_and_output() {
        let dir = tempdir().unwrap();
        let command = ExternalCommand::parse("sh -c echo").unwrap();
        let result = command.run(dir.path(), dir.path()).await.unwrap();
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        let command = ExternalCommand::new("sh".to_string(), vec!["-c".into(), "exit 3".into()]);
        let result = command.run(dir.path(), dir.path()).await.unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let dir = tempdir().unwrap();
        let command = ExternalCommand::new("sleep".to_string(), vec!["5".into()])
            .with_timeout(Duration::from_millis(50));
        let err = command.run(dir.path(), dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_version_probe_failure_is_absence() {
        let command = ExternalCommand::new("definitely-not-a-binary".to_string(), vec![]);
        assert_eq!(probe_tool_version(&command).await, None);
    }

    #[tokio::test]
    async fn test_version_probe_takes_first_line() {
        let command = ExternalCommand::new(
            "sh".to_string(),
            vec!["-c".into(), "printf 'tool 2.1\\nextra'".into()],
        );
        assert_eq!(probe_tool_version(&command).await.as_deref(), Some("tool 2.1"));
    }
}
