//! Locates the trainer's configuration file after a run.
//!
//! The trainer writes into `<models>/<experiment>/<method>/<timestamp>/`.
//! The method level is named after the trained model, so it is looked up
//! by name; runs of other variants left in the same tree are never picked.
//! At the other levels the newest entry wins, and timestamps sort
//! chronologically as strings.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ArtifactDiscoveryError;

/// Number of auto-generated directory levels below the training root.
pub const TRAINING_TREE_DEPTH: usize = 3;
/// File name of the trainer's run configuration.
pub const TRAINING_CONFIG_FILE: &str = "config.yml";

/// Finds the `config.yml` of the newest `model` run exactly
/// [`TRAINING_TREE_DEPTH`] levels below `training_dir`.
///
/// # Errors
///
/// Returns [`ArtifactDiscoveryError`] when a level holds no subdirectory,
/// the experiment has no run of `model`, a level cannot be read, or the
/// final directory has no config file.
pub fn discover_training_config(
    training_dir: &Path,
    model: &str,
) -> Result<PathBuf, ArtifactDiscoveryError> {
    let experiment = latest_subdirectory(training_dir)?
        .ok_or_else(|| ArtifactDiscoveryError::empty_level(training_dir, 0, TRAINING_TREE_DEPTH))?;

    let method = experiment.join(model);
    if !method.is_dir() {
        return Err(ArtifactDiscoveryError::empty_level(&method, 1, TRAINING_TREE_DEPTH));
    }

    let run = latest_subdirectory(&method)?
        .ok_or_else(|| ArtifactDiscoveryError::empty_level(&method, 2, TRAINING_TREE_DEPTH))?;

    let config = run.join(TRAINING_CONFIG_FILE);
    if !config.is_file() {
        return Err(ArtifactDiscoveryError::missing_file(
            &config,
            "training configuration",
        ));
    }

    tracing::debug!(config = %config.display(), model, "Discovered training config");
    Ok(config)
}

fn latest_subdirectory(dir: &Path) -> Result<Option<PathBuf>, ArtifactDiscoveryError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ArtifactDiscoveryError::new(
                dir,
                format!("cannot read training output: {e}"),
            ))
        }
    };

    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.file_name())
        .max()
        .map(|name| dir.join(name)))
}
