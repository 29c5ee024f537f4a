//! Pipeline event type for lifecycle notifications.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::{PipelineState, Stage, StageDecision};

/// An event emitted while a job runs.
///
/// Events are consumed by event sinks for logging, monitoring, or test
/// assertions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The event type (e.g., "stage.started", "pipeline.retry_scheduled").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl PipelineEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns the payload as a JSON object.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        serde_json::Value::Object(self.data.clone().into_iter().collect())
    }

    /// Creates a "stage.decided" event.
    #[must_use]
    pub fn decided(stage: Stage, decision: StageDecision) -> Self {
        Self::new("stage.decided")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("decision", serde_json::json!(decision.to_string()))
    }

    /// Creates a "stage.started" event.
    #[must_use]
    pub fn started(stage: Stage) -> Self {
        Self::new("stage.started").add_data("stage", serde_json::json!(stage.as_str()))
    }

    /// Creates a "stage.completed" event.
    #[must_use]
    pub fn completed(stage: Stage, duration_ms: f64) -> Self {
        Self::new("stage.completed")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "stage.failed" event carrying the attempt's final state.
    #[must_use]
    pub fn failed(stage: Stage, state: PipelineState, error: &str) -> Self {
        Self::new("stage.failed")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("state", serde_json::json!(state))
            .add_data("error", serde_json::json!(error))
    }

    /// Creates a "stage.skipped" event.
    #[must_use]
    pub fn skipped(stage: Stage, reason: &str) -> Self {
        Self::new("stage.skipped")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("reason", serde_json::json!(reason))
    }

    /// Creates a "stage.reset" event, emitted before existing output is
    /// discarded on start-over.
    #[must_use]
    pub fn reset(stage: Stage) -> Self {
        Self::new("stage.reset").add_data("stage", serde_json::json!(stage.as_str()))
    }

    /// Creates an "artifact.deleted" event.
    #[must_use]
    pub fn artifact_deleted(stage: Stage, path: &Path) -> Self {
        Self::new("artifact.deleted")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("path", serde_json::json!(path.display().to_string()))
    }
}
