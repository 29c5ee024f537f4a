//! Bounded retries around whole controller runs.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::PipelineEvent;
use crate::errors::{Result, SplatflowError};
use crate::events::{EventSink, NoOpEventSink};
use crate::utils::generate_run_id;

use super::{should_retry, ControllerReport, JobSpec, PipelineController, RetryDecision, RetryPolicy, RetryState};

/// A successful supervised run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Identifier of this run, shared by all its attempts.
    pub run_id: String,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Report of the successful attempt.
    pub report: ControllerReport,
}

impl RunOutcome {
    /// The exported point cloud.
    #[must_use]
    pub fn artifact(&self) -> &PathBuf {
        &self.report.artifact
    }
}

/// Reruns the controller from the top until it succeeds or attempts run out.
///
/// Attempts are strictly sequential. The supervisor remembers nothing about
/// stages; a retry resumes from whatever valid output the failed attempt
/// left on disk.
#[derive(Debug, Clone)]
pub struct RetrySupervisor {
    controller: PipelineController,
    policy: RetryPolicy,
    sink: Arc<dyn EventSink>,
}

impl RetrySupervisor {
    /// Creates a supervisor with the default policy.
    #[must_use]
    pub fn new(controller: PipelineController) -> Self {
        Self {
            controller,
            policy: RetryPolicy::default(),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `job` with retries.
    ///
    /// Only the first attempt honours `start_over`; later attempts resume.
    ///
    /// # Errors
    ///
    /// Returns [`SplatflowError::Config`] for an unusable policy,
    /// [`SplatflowError::InvalidJob`] without running anything, and
    /// [`SplatflowError::RetryExhausted`] carrying the final attempt's error
    /// once every attempt failed.
    pub async fn execute(&self, job: &JobSpec) -> Result<RunOutcome> {
        self.policy.validate()?;
        job.validate()?;

        let run_id = generate_run_id().to_string();
        let mut state = RetryState::new();

        loop {
            let attempt = state.begin_attempt();
            let attempt_job = if attempt == 1 { job.clone() } else { job.resumed() };

            tracing::info!(
                run_id = %run_id,
                attempt,
                max_attempts = self.policy.max_attempts,
                "Starting attempt"
            );
            self.sink.try_emit(
                PipelineEvent::new("pipeline.attempt_started")
                    .add_data("run_id", json!(run_id))
                    .add_data("attempt", json!(attempt)),
            );

            let error = match self.controller.run(&attempt_job).await {
                Ok(report) => {
                    tracing::info!(
                        run_id = %run_id,
                        attempt,
                        artifact = %report.artifact.display(),
                        "Pipeline completed"
                    );
                    self.sink.try_emit(
                        PipelineEvent::new("pipeline.completed")
                            .add_data("run_id", json!(run_id))
                            .add_data("attempts", json!(attempt))
                            .add_data("artifact", json!(report.artifact.display().to_string())),
                    );
                    return Ok(RunOutcome {
                        run_id,
                        attempts: attempt,
                        report,
                    });
                }
                Err(e) => e,
            };

            tracing::warn!(run_id = %run_id, attempt, error = %error, "Attempt failed");
            self.sink.try_emit(
                PipelineEvent::new("pipeline.attempt_failed")
                    .add_data("run_id", json!(run_id))
                    .add_data("attempt", json!(attempt))
                    .add_data("error", json!(error.to_string())),
            );

            match should_retry(&state, &self.policy) {
                RetryDecision::Retry(cooldown) => {
                    let cooldown_ms = u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX);
                    tracing::info!(run_id = %run_id, attempt, cooldown_ms, "Retrying after cooldown");
                    self.sink.try_emit(
                        PipelineEvent::new("pipeline.retry_scheduled")
                            .add_data("run_id", json!(run_id))
                            .add_data("attempt", json!(attempt))
                            .add_data("cooldown_ms", json!(cooldown_ms)),
                    );
                    tokio::time::sleep(cooldown).await;
                }
                RetryDecision::GiveUp => {
                    tracing::error!(run_id = %run_id, attempts = attempt, error = %error, "Retries exhausted");
                    self.sink.try_emit(
                        PipelineEvent::new("pipeline.exhausted")
                            .add_data("run_id", json!(run_id))
                            .add_data("attempts", json!(attempt))
                            .add_data("error", json!(error.to_string())),
                    );
                    return Err(SplatflowError::RetryExhausted {
                        attempts: attempt,
                        last: Box::new(error),
                    });
                }
            }
        }
    }
}
