//! Command builders for each external tool invocation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::ToolPrograms;
use crate::layout::JobLayout;
use crate::runner::CommandSpec;

/// Scene graph type passed to the reconstruction tool.
const SCENE_GRAPH_TYPE: &str = "swin";
/// Sliding window size of the scene graph.
const SCENE_GRAPH_WINDOW: u32 = 15;

/// Extra trainer flags enabled by advanced training.
pub const ADVANCED_TRAINING_FLAGS: [(&str, &str); 4] = [
    ("--pipeline.model.cull-alpha-thresh", "0.005"),
    ("--pipeline.model.continue-cull-post-densification", "False"),
    ("--pipeline.model.use-scale-regularization", "True"),
    ("--pipeline.model.densify-grad-thresh", "0.0006"),
];

/// Input to the training data preparation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "path", rename_all = "snake_case")]
pub enum DataSource {
    /// Extracted frames with camera poses from the existing sparse model.
    SparseModel(PathBuf),
    /// A directory of images; poses are estimated by the toolkit.
    Images(PathBuf),
    /// A video file; frames and poses are produced by the toolkit.
    Video(PathBuf),
}

impl DataSource {
    /// The toolkit's input mode subcommand.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::SparseModel(_) | Self::Images(_) => "images",
            Self::Video(_) => "video",
        }
    }

    /// The input path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::SparseModel(path) | Self::Images(path) | Self::Video(path) => path,
        }
    }
}

/// Trainer settings of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingOptions {
    /// Model variant, e.g. `splatfacto-big`.
    pub model: String,
    /// Maximum number of training iterations.
    pub max_iterations: u32,
    /// Append [`ADVANCED_TRAINING_FLAGS`].
    pub advanced: bool,
    /// Use the MCMC densification strategy.
    pub use_mcmc: bool,
    /// Number of downscaled image caches to produce.
    pub num_downscales: u32,
}

/// Builds the argument vectors of one job.
#[derive(Debug, Clone, Copy)]
pub struct ToolCommands<'a> {
    programs: &'a ToolPrograms,
    layout: &'a JobLayout,
}

impl<'a> ToolCommands<'a> {
    /// Creates a builder for the job rooted at `layout`.
    #[must_use]
    pub fn new(programs: &'a ToolPrograms, layout: &'a JobLayout) -> Self {
        Self { programs, layout }
    }

    /// `sfextract <video> --frame-count <n> --output <frames>`
    #[must_use]
    pub fn extract_frames(&self, video: &Path, frame_count: u32) -> CommandSpec {
        CommandSpec::new(&self.programs.frame_extractor)
            .path_arg(video)
            .flag("--frame-count", frame_count.to_string())
            .arg("--output")
            .path_arg(&self.layout.frames_dir())
    }

    /// Runs the reconstruction script over the frames, writing the sparse
    /// model below the job root.
    #[must_use]
    pub fn reconstruct(&self) -> CommandSpec {
        CommandSpec::new(&self.programs.python)
            .arg(&self.programs.reconstruction_script)
            .flag("--model_name", &self.programs.reconstruction_model)
            .arg("--input_files")
            .path_arg(&self.layout.frames_dir())
            .arg("--output_dir")
            .path_arg(self.layout.root())
            .flag("--scenegraph_type", SCENE_GRAPH_TYPE)
            .flag("--winsize", SCENE_GRAPH_WINDOW.to_string())
            .arg("--win_cyclic")
    }

    /// Prepares training data from `source`.
    ///
    /// With [`DataSource::SparseModel`] the toolkit reuses the existing
    /// reconstruction instead of estimating poses itself.
    #[must_use]
    pub fn process_data(&self, source: &DataSource, num_downscales: u32) -> CommandSpec {
        let command = CommandSpec::new(&self.programs.process_data)
            .arg(source.mode())
            .arg("--data")
            .path_arg(source.path())
            .arg("--output-dir")
            .path_arg(self.layout.root())
            .flag("--num-downscales", num_downscales.to_string());

        match source {
            DataSource::SparseModel(_) => command
                .arg("--skip-colmap")
                .arg("--colmap-model-path")
                .path_arg(&JobLayout::sparse_model_relative()),
            DataSource::Images(_) | DataSource::Video(_) => command,
        }
    }

    /// Trains the model on the prepared data.
    #[must_use]
    pub fn train(&self, options: &TrainingOptions) -> CommandSpec {
        let mut command = CommandSpec::new(&self.programs.train)
            .arg(&options.model)
            .arg("--data")
            .path_arg(self.layout.root())
            .arg("--output-dir")
            .path_arg(&self.layout.training_dir())
            .flag("--max-num-iterations", options.max_iterations.to_string())
            .flag("--viewer.quit-on-train-completion", "True");

        if options.use_mcmc {
            command = command.flag("--pipeline.model.strategy", "mcmc");
        }
        if options.advanced {
            for (flag, value) in ADVANCED_TRAINING_FLAGS {
                command = command.flag(flag, value);
            }
        }
        command
    }

    /// Exports the trained model as a Gaussian splat point cloud.
    #[must_use]
    pub fn export(&self, config: &Path) -> CommandSpec {
        CommandSpec::new(&self.programs.export)
            .arg("gaussian-splat")
            .arg("--load-config")
            .path_arg(config)
            .arg("--output-dir")
            .path_arg(&self.layout.export_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options() -> TrainingOptions {
        TrainingOptions {
            model: "splatfacto-big".to_string(),
            max_iterations: 100_000,
            advanced: false,
            use_mcmc: false,
            num_downscales: 2,
        }
    }

    #[test]
    fn test_extract_frames() {
        let programs = ToolPrograms::default();
        let layout = JobLayout::new("/job");
        let command = ToolCommands::new(&programs, &layout)
            .extract_frames(Path::new("/videos/lesson.mp4"), 400);

        assert_eq!(
            command.to_string(),
            "sfextract /videos/lesson.mp4 --frame-count 400 --output /job/input"
        );
    }

    #[test]
    fn test_reconstruct() {
        let programs = ToolPrograms::default();
        let layout = JobLayout::new("/job");
        let command = ToolCommands::new(&programs, &layout).reconstruct();

        assert_eq!(command.program, "python");
        assert_eq!(
            command.args,
            vec![
                "mast3r_glomap_cli.py",
                "--model_name",
                "MASt3R_ViTLarge_BaseDecoder_512_catmlpdpt_metric",
                "--input_files",
                "/job/input",
                "--output_dir",
                "/job",
                "--scenegraph_type",
                "swin",
                "--winsize",
                "15",
                "--win_cyclic",
            ]
        );
    }

    #[test]
    fn test_process_data_with_sparse_model() {
        let programs = ToolPrograms::default();
        let layout = JobLayout::new("/job");
        let command = ToolCommands::new(&programs, &layout)
            .process_data(&DataSource::SparseModel(layout.frames_dir()), 2);

        assert_eq!(
            command.to_string(),
            "ns-process-data images --data /job/input --output-dir /job --num-downscales 2 \
             --skip-colmap --colmap-model-path colmap/sparse/0"
        );
    }

    #[test]
    fn test_process_data_from_video() {
        let programs = ToolPrograms::default();
        let layout = JobLayout::new("/job");
        let command = ToolCommands::new(&programs, &layout)
            .process_data(&DataSource::Video(PathBuf::from("/videos/a.mp4")), 3);

        assert_eq!(command.args[0], "video");
        assert!(!command.has_arg("--skip-colmap"));
        assert!(!command.has_arg("--colmap-model-path"));
        assert_eq!(command.value_of("--num-downscales"), Some("3"));
    }

    #[test]
    fn test_train_plain() {
        let programs = ToolPrograms::default();
        let layout = JobLayout::new("/job");
        let command = ToolCommands::new(&programs, &layout).train(&options());

        assert_eq!(
            command.to_string(),
            "ns-train splatfacto-big --data /job --output-dir /job/models \
             --max-num-iterations 100000 --viewer.quit-on-train-completion True"
        );
    }

    #[test]
    fn test_train_advanced_with_mcmc() {
        let programs = ToolPrograms::default();
        let layout = JobLayout::new("/job");
        let command = ToolCommands::new(&programs, &layout).train(&TrainingOptions {
            advanced: true,
            use_mcmc: true,
            ..options()
        });

        assert_eq!(command.value_of("--pipeline.model.strategy"), Some("mcmc"));
        for (flag, value) in ADVANCED_TRAINING_FLAGS {
            assert_eq!(command.value_of(flag), Some(value));
        }
    }

    #[test]
    fn test_export() {
        let programs = ToolPrograms::default();
        let layout = JobLayout::new("/job");
        let command = ToolCommands::new(&programs, &layout)
            .export(Path::new("/job/models/unnamed/splatfacto/2024-01-01_000000/config.yml"));

        assert_eq!(
            command.to_string(),
            "ns-export gaussian-splat --load-config \
             /job/models/unnamed/splatfacto/2024-01-01_000000/config.yml --output-dir /job/splat"
        );
    }
}
