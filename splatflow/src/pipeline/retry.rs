//! Bounded whole-pipeline retry with a fixed cooldown.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{Result, SplatflowError};

fn default_max_attempts() -> u32 {
    3
}

fn default_cooldown_ms() -> u64 {
    180_000
}

/// How often a failed pipeline is attempted and how long to wait between
/// attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between a failed attempt and the next one, in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self::default()
            .with_max_attempts(max_attempts)
            .with_cooldown(cooldown)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_ms = u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The cooldown as a duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Rejects policies that would never run the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`SplatflowError::Config`] when `max_attempts` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SplatflowError::config("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No attempts left.
    GiveUp,
}

/// Attempt counter of one supervised run.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts started so far.
    pub attempt: u32,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the next attempt and returns its one-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Returns true if no attempts remain.
    #[must_use]
    pub fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempt >= policy.max_attempts
    }
}

/// Decides what follows a failed attempt.
#[must_use]
pub fn should_retry(state: &RetryState, policy: &RetryPolicy) -> RetryDecision {
    if state.is_exhausted(policy) {
        RetryDecision::GiveUp
    } else {
        RetryDecision::Retry(policy.cooldown())
    }
}
