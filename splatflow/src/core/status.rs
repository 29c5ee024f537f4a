//! Pipeline state and per-stage decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Stage;

/// Progress of a single pipeline attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No stage has been confirmed yet.
    NotStarted,
    /// Frames are present and valid.
    FramesReady,
    /// The sparse reconstruction model is present and valid.
    ReconstructionReady,
    /// The exported point cloud is present.
    TrainingComplete,
    /// A stage failed and the attempt was aborted.
    Failed,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::FramesReady => write!(f, "frames_ready"),
            Self::ReconstructionReady => write!(f, "reconstruction_ready"),
            Self::TrainingComplete => write!(f, "training_complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl PipelineState {
    /// The state reached once `stage` has valid output.
    #[must_use]
    pub const fn after(stage: Stage) -> Self {
        match stage {
            Stage::FrameExtraction => Self::FramesReady,
            Stage::SceneReconstruction => Self::ReconstructionReady,
            Stage::NeuralTraining => Self::TrainingComplete,
        }
    }

    /// Advances to the state reached after `stage`.
    ///
    /// Transitions out of [`PipelineState::Failed`] are ignored; an attempt
    /// that failed stays failed.
    pub fn advance(&mut self, stage: Stage) {
        if *self != Self::Failed {
            *self = Self::after(stage);
        }
    }
}

/// What the controller does with one stage during an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageDecision {
    /// Output is already present and valid; nothing runs.
    Skip,
    /// Output is absent or invalid; the stage runs.
    Run,
    /// Start-over was requested; existing output is deleted first.
    ResetAndRun,
    /// The stage is not part of the selected pipeline path.
    Bypass,
}

impl fmt::Display for StageDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Run => write!(f, "run"),
            Self::ResetAndRun => write!(f, "reset_and_run"),
            Self::Bypass => write!(f, "bypass"),
        }
    }
}

impl StageDecision {
    /// Decides what to do with a stage.
    ///
    /// `start_over` wins over an existing valid output; otherwise a valid
    /// output is skipped and anything else runs.
    #[must_use]
    pub const fn decide(start_over: bool, complete: bool) -> Self {
        if start_over {
            Self::ResetAndRun
        } else if complete {
            Self::Skip
        } else {
            Self::Run
        }
    }

    /// Returns true if the stage's external tools are invoked.
    #[must_use]
    pub fn executes(&self) -> bool {
        matches!(self, Self::Run | Self::ResetAndRun)
    }
}
