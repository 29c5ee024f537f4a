//! The three ordered pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One ordered phase of the pipeline.
///
/// Stages always execute in [`Stage::ALL`] order; a stage's output is only
/// inspected after its predecessor is known to be valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Extract still frames from the source video.
    FrameExtraction,
    /// Recover camera poses and a sparse point cloud from the frames.
    SceneReconstruction,
    /// Prepare, train and export the Gaussian-splat model.
    NeuralTraining,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 3] = [
        Self::FrameExtraction,
        Self::SceneReconstruction,
        Self::NeuralTraining,
    ];

    /// Snake-case identifier used in events and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FrameExtraction => "frame_extraction",
            Self::SceneReconstruction => "scene_reconstruction",
            Self::NeuralTraining => "neural_training",
        }
    }

    /// Stages whose output is derived from this stage's output.
    #[must_use]
    pub const fn downstream(self) -> &'static [Self] {
        match self {
            Self::FrameExtraction => &[Self::SceneReconstruction, Self::NeuralTraining],
            Self::SceneReconstruction => &[Self::NeuralTraining],
            Self::NeuralTraining => &[],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameExtraction => write!(f, "frame extraction"),
            Self::SceneReconstruction => write!(f, "scene reconstruction"),
            Self::NeuralTraining => write!(f, "neural training"),
        }
    }
}
