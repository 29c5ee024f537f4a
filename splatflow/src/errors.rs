//! Error types for the splatflow orchestrator.
//!
//! Stage-level failures abort the current pipeline attempt. Only the retry
//! supervisor decides whether an error is masked by another attempt or
//! surfaced to the caller.

use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::Stage;

/// Stable error code reported by the HTTP boundary for every failure.
pub const PIPELINE_ERROR_CODE: u16 = 1001;

/// The main error type for splatflow operations.
#[derive(Debug, Error)]
pub enum SplatflowError {
    /// An external tool exited with a nonzero status.
    #[error("{stage} failed: `{program}` exited with {}", describe_exit(.exit_code))]
    StageExecution {
        /// The stage that was running.
        stage: Stage,
        /// The program that was invoked.
        program: String,
        /// Exit code, `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
    },

    /// An external tool could not be started at all.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// The program that was invoked.
        program: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// An artifact expected after a stage was not found.
    #[error("{0}")]
    ArtifactDiscovery(#[from] ArtifactDiscoveryError),

    /// Every permitted attempt failed; carries the last error.
    #[error("pipeline failed after {attempts} attempt(s): {last}")]
    RetryExhausted {
        /// Number of attempts that were made.
        attempts: u32,
        /// The error that aborted the final attempt.
        #[source]
        last: Box<SplatflowError>,
    },

    /// The job description is invalid.
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Another job currently owns the working directory.
    #[error("working directory {} is already in use by another job", .0.display())]
    WorkspaceBusy(PathBuf),

    /// An object storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A configuration value is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl SplatflowError {
    /// Creates a stage execution error.
    #[must_use]
    pub fn stage_execution(stage: Stage, program: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::StageExecution {
            stage,
            program: program.into(),
            exit_code,
        }
    }

    /// Creates a storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an invalid job error.
    #[must_use]
    pub fn invalid_job(message: impl Into<String>) -> Self {
        Self::InvalidJob(message.into())
    }

    /// Returns the error that ultimately caused this one.
    ///
    /// For [`SplatflowError::RetryExhausted`] this is the error of the final
    /// attempt; every other variant returns itself.
    #[must_use]
    pub fn last_error(&self) -> &Self {
        match self {
            Self::RetryExhausted { last, .. } => last.last_error(),
            other => other,
        }
    }

    /// Short machine-readable name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StageExecution { .. } => "StageExecutionError",
            Self::Spawn { .. } => "SpawnError",
            Self::ArtifactDiscovery(_) => "ArtifactDiscoveryError",
            Self::RetryExhausted { .. } => "RetryExhausted",
            Self::InvalidJob(_) => "InvalidJob",
            Self::WorkspaceBusy(_) => "WorkspaceBusy",
            Self::Storage(_) => "StorageError",
            Self::Config(_) => "ConfigError",
            Self::Io(_) => "IoError",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), json!(self.kind()));
        map.insert("message".to_string(), json!(self.to_string()));

        match self {
            Self::StageExecution { stage, program, exit_code } => {
                map.insert("stage".to_string(), json!(stage.as_str()));
                map.insert("program".to_string(), json!(program));
                map.insert("exit_code".to_string(), json!(exit_code));
            }
            Self::RetryExhausted { attempts, last } => {
                map.insert("attempts".to_string(), json!(attempts));
                let last_map: serde_json::Map<String, serde_json::Value> =
                    last.to_dict().into_iter().collect();
                map.insert("last".to_string(), serde_json::Value::Object(last_map));
            }
            Self::ArtifactDiscovery(err) => {
                map.insert("path".to_string(), json!(err.path.display().to_string()));
            }
            _ => {}
        }

        map
    }
}

/// Raised when an expected artifact is missing after a stage ran, or when
/// an auto-generated directory tree is shallower than expected.
#[derive(Debug, Clone, Error)]
#[error("{message} (at {})", .path.display())]
pub struct ArtifactDiscoveryError {
    /// The path that was probed.
    pub path: PathBuf,
    /// Human-readable description of what was expected.
    pub message: String,
}

impl ArtifactDiscoveryError {
    /// Creates a new artifact discovery error.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// An expected file does not exist.
    #[must_use]
    pub fn missing_file(path: &Path, what: &str) -> Self {
        Self::new(path, format!("expected {what} was not produced"))
    }

    /// A directory level of an auto-generated tree holds no subdirectory.
    #[must_use]
    pub fn empty_level(path: &Path, level: usize, expected_depth: usize) -> Self {
        Self::new(
            path,
            format!(
                "training output is only {level} of {expected_depth} directory levels deep: \
                 no subdirectory found"
            ),
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = SplatflowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_execution_message() {
        let err = SplatflowError::stage_execution(Stage::SceneReconstruction, "python", Some(2));
        assert_eq!(
            err.to_string(),
            "scene reconstruction failed: `python` exited with exit code 2"
        );
    }

    #[test]
    fn test_stage_execution_signal_message() {
        let err = SplatflowError::stage_execution(Stage::FrameExtraction, "sfextract", None);
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_retry_exhausted_keeps_last_error() {
        let last = SplatflowError::stage_execution(Stage::NeuralTraining, "ns-train", Some(1));
        let err = SplatflowError::RetryExhausted {
            attempts: 3,
            last: Box::new(last),
        };

        assert!(err.to_string().contains("3 attempt(s)"));
        assert!(err.to_string().contains("ns-train"));
        assert!(matches!(
            err.last_error(),
            SplatflowError::StageExecution { stage: Stage::NeuralTraining, .. }
        ));
    }

    #[test]
    fn test_artifact_discovery_empty_level() {
        let err = ArtifactDiscoveryError::empty_level(Path::new("/job/models/splat"), 2, 3);
        let message = err.to_string();
        assert!(message.contains("2 of 3"));
        assert!(message.contains("/job/models/splat"));
    }

    #[test]
    fn test_to_dict() {
        let err = SplatflowError::stage_execution(Stage::FrameExtraction, "sfextract", Some(1));
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "StageExecutionError");
        assert_eq!(dict.get("stage").unwrap(), "frame_extraction");
        assert_eq!(dict.get("exit_code").unwrap(), 1);
    }
}
