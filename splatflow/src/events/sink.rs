//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt::Debug;
use tracing::{debug, info, Level};

use crate::core::PipelineEvent;

/// Trait for event sinks that can receive events.
#[async_trait]
pub trait EventSink: Send + Sync + Debug {
    /// Emits an event asynchronously.
    async fn emit(&self, event: PipelineEvent);

    /// Tries to emit an event without blocking.
    ///
    /// This method never fails; sinks that cannot deliver an event drop it.
    fn try_emit(&self, event: PipelineEvent);
}

/// A no-op event sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: PipelineEvent) {}

    fn try_emit(&self, _event: PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    fn log_event(&self, event: &PipelineEvent) {
        let payload = event.payload();
        if self.level == Level::DEBUG {
            debug!(event_type = %event.event_type, event_data = %payload, "Event: {}", event.event_type);
        } else {
            info!(event_type = %event.event_type, event_data = %payload, "Event: {}", event.event_type);
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: PipelineEvent) {
        self.log_event(&event);
    }

    fn try_emit(&self, event: PipelineEvent) {
        self.log_event(&event);
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the collected event types in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|e| e.event_type.clone()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Counts events with exactly this type.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: PipelineEvent) {
        self.events.write().push(event);
    }

    fn try_emit(&self, event: PipelineEvent) {
        self.events.write().push(event);
    }
}
