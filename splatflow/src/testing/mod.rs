//! Testing utilities for splatflow jobs.
//!
//! This module provides:
//! - A recording command runner that simulates the external tools
//! - Temporary job directories with helpers to lay down stage output

mod fixtures;
mod mocks;

pub use fixtures::{write_sized_file, JobFixture};
pub use mocks::{RecordingRunner, ToolEffect};
