//! Description of one pipeline invocation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::{Result, SplatflowError};
use crate::layout::JobLayout;
use crate::tools::TrainingOptions;
use crate::utils::validate_model_variant;

fn default_frame_count() -> u32 {
    400
}

fn default_max_iterations() -> u32 {
    100_000
}

fn default_model() -> String {
    "splatfacto-big".to_string()
}

fn default_true() -> bool {
    true
}

fn default_num_downscales() -> u32 {
    2
}

/// One end-to-end pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Source video.
    pub video: PathBuf,
    /// Working directory root, owned by this job while it runs.
    pub root: PathBuf,
    /// Number of frames to extract.
    #[serde(default = "default_frame_count")]
    pub frame_count: u32,
    /// Maximum number of training iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Training model variant.
    #[serde(default = "default_model")]
    pub model: String,
    /// Delete existing output and rerun every stage.
    #[serde(default)]
    pub start_over: bool,
    /// Run only the training stage, directly on raw input.
    #[serde(default)]
    pub only_training: bool,
    /// Enable the advanced trainer flags.
    #[serde(default = "default_true")]
    pub advanced_training: bool,
    /// Use the MCMC densification strategy.
    #[serde(default = "default_true")]
    pub use_mcmc: bool,
    /// Number of downscaled image caches.
    #[serde(default = "default_num_downscales")]
    pub num_downscales: u32,
}

impl JobSpec {
    /// Creates a job with default settings.
    #[must_use]
    pub fn new(video: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            video: video.into(),
            root: root.into(),
            frame_count: default_frame_count(),
            max_iterations: default_max_iterations(),
            model: default_model(),
            start_over: false,
            only_training: false,
            advanced_training: true,
            use_mcmc: true,
            num_downscales: default_num_downscales(),
        }
    }

    /// Sets the frame count.
    #[must_use]
    pub fn with_frame_count(mut self, frame_count: u32) -> Self {
        self.frame_count = frame_count;
        self
    }

    /// Sets the maximum training iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the model variant.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the start-over flag.
    #[must_use]
    pub fn with_start_over(mut self, start_over: bool) -> Self {
        self.start_over = start_over;
        self
    }

    /// Sets the training-only flag.
    #[must_use]
    pub fn with_only_training(mut self, only_training: bool) -> Self {
        self.only_training = only_training;
        self
    }

    /// Sets the advanced training flag.
    #[must_use]
    pub fn with_advanced_training(mut self, advanced: bool) -> Self {
        self.advanced_training = advanced;
        self
    }

    /// Sets the MCMC strategy flag.
    #[must_use]
    pub fn with_mcmc(mut self, use_mcmc: bool) -> Self {
        self.use_mcmc = use_mcmc;
        self
    }

    /// Sets the number of downscaled image caches.
    #[must_use]
    pub fn with_num_downscales(mut self, num_downscales: u32) -> Self {
        self.num_downscales = num_downscales;
        self
    }

    /// The on-disk layout of this job.
    #[must_use]
    pub fn layout(&self) -> JobLayout {
        JobLayout::new(&self.root)
    }

    /// Trainer settings derived from this job.
    #[must_use]
    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            model: self.model.clone(),
            max_iterations: self.max_iterations,
            advanced: self.advanced_training,
            use_mcmc: self.use_mcmc,
            num_downscales: self.num_downscales,
        }
    }

    /// The job as run by a retry: identical, but resuming instead of
    /// starting over.
    #[must_use]
    pub fn resumed(&self) -> Self {
        Self {
            start_over: false,
            ..self.clone()
        }
    }

    /// Checks the job for values no tool would accept.
    ///
    /// # Errors
    ///
    /// Returns [`SplatflowError::InvalidJob`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(SplatflowError::invalid_job("working directory must not be empty"));
        }
        if self.frame_count == 0 {
            return Err(SplatflowError::invalid_job("frame_count must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(SplatflowError::invalid_job("max_iterations must be positive"));
        }
        validate_model_variant(&self.model)
    }
}
