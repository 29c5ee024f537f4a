//! Argument vectors for the external frame, reconstruction and training tools.
//!
//! Nothing here runs a process; builders return [`CommandSpec`] values that a
//! [`crate::runner::CommandRunner`] executes.
//!
//! [`CommandSpec`]: crate::runner::CommandSpec

mod commands;
mod discovery;
mod programs;

pub use commands::{DataSource, ToolCommands, TrainingOptions, ADVANCED_TRAINING_FLAGS};
pub use discovery::{discover_training_config, TRAINING_CONFIG_FILE, TRAINING_TREE_DEPTH};
pub use programs::ToolPrograms;
