//! Event sinks for pipeline lifecycle notifications.
//!
//! Sinks are injected into the controller and supervisor; there is no
//! process-wide default sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
