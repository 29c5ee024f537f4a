//! Real subprocess execution with line-by-line output logging.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::{CommandRunner, CommandSpec, ExitReport};
use crate::errors::{Result, SplatflowError};

/// Runs commands as child processes of the orchestrator.
///
/// Standard output and standard error are forwarded to the log as they
/// arrive, one event per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ExitReport> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| SplatflowError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdout = forward_lines(child.stdout.take(), &spec.program, "stdout");
        let stderr = forward_lines(child.stderr.take(), &spec.program, "stderr");
        let (status, (), ()) = tokio::join!(child.wait(), stdout, stderr);
        let status = status?;

        Ok(ExitReport {
            code: status.code(),
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(stream: Option<R>, program: &str, name: &str) {
    let Some(stream) = stream else {
        return;
    };

    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::info!(target: "splatflow::runner", program, stream = name, "{line}");
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(program, stream = name, error = %e, "Stopped reading child output");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let report = ProcessRunner::new()
            .run(&CommandSpec::new("sh").args(["-c", "echo hello; echo oops >&2"]))
            .await
            .unwrap();
        assert!(report.success());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let report = ProcessRunner::new()
            .run(&CommandSpec::new("sh").args(["-c", "exit 7"]))
            .await
            .unwrap();
        assert_eq!(report.code, Some(7));
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = ProcessRunner::new()
            .run(&CommandSpec::new("splatflow-no-such-program"))
            .await
            .unwrap_err();
        assert!(matches!(err, SplatflowError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = ProcessRunner::new()
            .run(&CommandSpec::new("sh").args(["-c", "touch marker"]).in_dir(dir.path()))
            .await
            .unwrap();
        assert!(report.success());
        assert!(dir.path().join("marker").exists());
    }
}
