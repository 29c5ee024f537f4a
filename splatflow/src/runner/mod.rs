//! Stage runner: executes one external command per call.
//!
//! A runner never retries and never applies a timeout. A nonzero exit is
//! reported back to the caller, which aborts the current attempt.

mod command;
mod process;

pub use command::{CommandSpec, ExitReport};
pub use process::ProcessRunner;

use async_trait::async_trait;
use std::fmt::Debug;

use crate::core::Stage;
use crate::errors::{Result, SplatflowError};

/// Trait for executors of external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync + Debug {
    /// Runs `command` to completion and reports how it exited.
    ///
    /// Returns an error only when the process could not be run at all;
    /// a nonzero exit is a successful call with a failing [`ExitReport`].
    async fn run(&self, command: &CommandSpec) -> Result<ExitReport>;
}

/// Runs `command` on behalf of `stage`, turning a nonzero exit into
/// [`SplatflowError::StageExecution`].
pub async fn run_checked(
    runner: &dyn CommandRunner,
    stage: Stage,
    command: &CommandSpec,
) -> Result<ExitReport> {
    tracing::info!(stage = stage.as_str(), command = %command, "Running command");
    let report = runner.run(command).await?;

    if report.success() {
        tracing::info!(
            stage = stage.as_str(),
            program = %command.program,
            duration_ms = report.duration_ms,
            "Command finished"
        );
        Ok(report)
    } else {
        tracing::error!(
            stage = stage.as_str(),
            command = %command,
            exit_code = ?report.code,
            "Command failed"
        );
        Err(SplatflowError::stage_execution(
            stage,
            command.program.clone(),
            report.code,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;

    #[tokio::test]
    async fn test_run_checked_success() {
        let runner = RecordingRunner::new();
        let command = CommandSpec::new("sfextract").arg("video.mp4");

        let report = run_checked(&runner, Stage::FrameExtraction, &command).await;
        tokio_test::assert_ok!(report);
        assert_eq!(runner.programs(), vec!["sfextract".to_string()]);
    }

    #[tokio::test]
    async fn test_run_checked_maps_exit_code() {
        let runner = RecordingRunner::new().fail_program("sfextract", 3);
        let command = CommandSpec::new("sfextract");

        let err = run_checked(&runner, Stage::FrameExtraction, &command)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SplatflowError::StageExecution {
                stage: Stage::FrameExtraction,
                exit_code: Some(3),
                ..
            }
        ));
    }
}
