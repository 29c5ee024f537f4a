//! # Splatflow
//!
//! Resumable orchestration of a three-stage pipeline that turns a video into
//! a Gaussian-splat point cloud:
//!
//! - **Frame extraction**: sample still frames from the video
//! - **Scene reconstruction**: estimate a sparse 3D model from the frames
//! - **Neural training**: prepare data, train a splat model and export it
//!
//! Every stage's output lives on disk at a fixed location. Before running a
//! stage the controller checks whether valid output already exists, so an
//! interrupted job resumes where it stopped. A retry supervisor reruns the
//! whole controller a bounded number of times with a cooldown in between.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use splatflow::prelude::*;
//! use std::sync::Arc;
//!
//! let controller = PipelineController::new(Arc::new(ProcessRunner));
//! let supervisor = RetrySupervisor::new(controller).with_policy(RetryPolicy::default());
//!
//! let job = JobSpec::new("/videos/intro.mp4", "/lessons/intro_42");
//! let outcome = supervisor.execute(&job).await?;
//! println!("splat written to {}", outcome.artifact().display());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod inspector;
pub mod layout;
pub mod observability;
pub mod pipeline;
pub mod runner;
pub mod storage;
pub mod tools;
pub mod utils;
pub mod workspace;

#[cfg(feature = "server")]
pub mod server;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{PipelineDefaults, ServiceConfig};
    pub use crate::core::{PipelineEvent, PipelineState, Stage, StageDecision};
    pub use crate::errors::{ArtifactDiscoveryError, Result, SplatflowError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::inspector::ArtifactInspector;
    pub use crate::layout::JobLayout;
    pub use crate::pipeline::{
        ControllerReport, JobSpec, PipelineController, RetryPolicy, RetrySupervisor, RunOutcome,
    };
    pub use crate::runner::{CommandRunner, CommandSpec, ProcessRunner};
    pub use crate::storage::{LocalObjectStore, ObjectStore};
    pub use crate::tools::ToolPrograms;
    pub use crate::workspace::WorkspaceRegistry;
}
