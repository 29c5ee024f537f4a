//! Read-only completeness checks over stage artifacts.
//!
//! An incomplete stage is an ordinary control-flow signal, never an error:
//! every check answers `false` for missing, unreadable or partial output.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::{ArtifactCheck, Stage};
use crate::layout::JobLayout;

/// Evaluates stage validity predicates against the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactInspector;

/// Completeness of every stage, evaluated in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InspectionReport {
    /// Frames are present.
    pub frames: bool,
    /// The reconstruction model is present and valid.
    pub reconstruction: bool,
    /// Training output is present.
    pub training: bool,
}

impl InspectionReport {
    /// Returns true if every stage is complete.
    #[must_use]
    pub fn all_complete(&self) -> bool {
        self.frames && self.reconstruction && self.training
    }

    /// The first stage whose output is missing, if any.
    #[must_use]
    pub fn first_incomplete(&self) -> Option<Stage> {
        if !self.frames {
            Some(Stage::FrameExtraction)
        } else if !self.reconstruction {
            Some(Stage::SceneReconstruction)
        } else if !self.training {
            Some(Stage::NeuralTraining)
        } else {
            None
        }
    }
}

impl ArtifactInspector {
    /// Creates a new inspector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns true if `stage` already has valid output in `layout`.
    #[must_use]
    pub fn is_stage_complete(&self, stage: Stage, layout: &JobLayout) -> bool {
        let complete = self.evaluate(&layout.artifacts(stage).check);
        tracing::debug!(stage = stage.as_str(), complete, "Inspected stage artifacts");
        complete
    }

    /// Returns true if the training data has already been prepared.
    ///
    /// This is the training stage's own resume marker: once the calibration
    /// file exists, data preparation is not repeated.
    #[must_use]
    pub fn is_training_data_prepared(&self, layout: &JobLayout) -> bool {
        layout.calibration_file().is_file()
    }

    /// Inspects all stages in order.
    ///
    /// A stage is only evaluated once its predecessor is complete; later
    /// stages of an incomplete pipeline are reported as incomplete.
    #[must_use]
    pub fn inspect(&self, layout: &JobLayout) -> InspectionReport {
        let frames = self.is_stage_complete(Stage::FrameExtraction, layout);
        let reconstruction = frames && self.is_stage_complete(Stage::SceneReconstruction, layout);
        let training = reconstruction && self.is_stage_complete(Stage::NeuralTraining, layout);
        InspectionReport {
            frames,
            reconstruction,
            training,
        }
    }

    /// Evaluates a single validity predicate.
    #[must_use]
    pub fn evaluate(&self, check: &ArtifactCheck) -> bool {
        match check {
            ArtifactCheck::NonEmptyDir { dir } => has_entries(dir),
            ArtifactCheck::FixedFiles {
                dir,
                count,
                min_bytes,
            } => has_fixed_files(dir, *count, *min_bytes),
            ArtifactCheck::AllFiles { files } => files.iter().all(|file| file.is_file()),
        }
    }
}

fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn has_fixed_files(dir: &Path, count: usize, min_bytes: u64) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    let mut files = 0usize;
    for entry in entries {
        let Ok(entry) = entry else {
            return false;
        };
        let Ok(metadata) = fs::metadata(entry.path()) else {
            return false;
        };
        if !metadata.is_file() {
            continue;
        }
        if metadata.len() <= min_bytes {
            tracing::debug!(
                file = %entry.path().display(),
                size = metadata.len(),
                min_bytes,
                "Model file is truncated"
            );
            return false;
        }
        files += 1;
    }

    files == count
}
