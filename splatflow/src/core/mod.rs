//! Core domain model types for splatflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - The ordered pipeline stages
//! - Pipeline state and per-stage decisions
//! - Artifact sets and lifecycle events

mod artifact;
mod event;
mod stage;
mod status;

pub use artifact::{ArtifactCheck, ArtifactSet, PurgeTarget, MIN_MODEL_FILE_BYTES};
pub use event::PipelineEvent;
pub use stage::Stage;
pub use status::{PipelineState, StageDecision};
