//! Pipeline execution.
//!
//! This module provides:
//! - Job descriptions
//! - The single-attempt controller
//! - Retry policy and the retry supervisor

mod controller;
mod job;
mod retry;
mod supervisor;

#[cfg(test)]
mod integration_tests;

pub use controller::{ControllerReport, PipelineController, StageRecord};
pub use job::JobSpec;
pub use retry::{should_retry, RetryDecision, RetryPolicy, RetryState};
pub use supervisor::{RetrySupervisor, RunOutcome};
