//! Wall-clock timing of stages and attempts.

use std::time::Instant;

/// Measures how long a named unit of work takes.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: &'static str,
}

impl SpanTimer {
    /// Starts timing.
    #[must_use]
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Milliseconds since [`SpanTimer::start`].
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// The name given at start.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stops the timer, logs the duration at debug level and returns it.
    pub fn finish(self) -> f64 {
        let duration_ms = self.elapsed_ms();
        tracing::debug!(span_name = self.name, duration_ms, "Timed span finished");
        duration_ms
    }
}
