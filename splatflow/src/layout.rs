//! On-disk layout of a job's working directory.
//!
//! ```text
//! <root>/
//!   input/                     extracted frames
//!   colmap/sparse/0/           reconstruction model (3 files)
//!   transforms.json            calibration written by data preparation
//!   sparse_pc.ply              derived point cloud
//!   images/ images_2/ ...      downscaled image caches
//!   models/<exp>/<method>/<ts>/config.yml
//!   splat/splat.ply            exported Gaussian splat
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::{ArtifactCheck, ArtifactSet, PurgeTarget, Stage, MIN_MODEL_FILE_BYTES};

/// Name of the frames directory.
pub const FRAMES_DIR: &str = "input";
/// Sparse model location relative to the root.
pub const SPARSE_MODEL_DIR: [&str; 3] = ["colmap", "sparse", "0"];
/// Number of files the reconstruction model consists of.
pub const SPARSE_MODEL_FILE_COUNT: usize = 3;
/// Calibration marker produced by data preparation.
pub const CALIBRATION_FILE: &str = "transforms.json";
/// Point cloud derived from the reconstruction.
pub const DERIVED_POINT_CLOUD: &str = "sparse_pc.ply";
/// Downscaled image caches produced by data preparation.
pub const IMAGE_CACHE_DIRS: [&str; 4] = ["images", "images_2", "images_4", "images_8"];
/// Training output directory.
pub const TRAINING_DIR: &str = "models";
/// Export directory.
pub const EXPORT_DIR: &str = "splat";
/// Exported point cloud file name.
pub const EXPORT_FILE: &str = "splat.ply";

/// Every path of one job, derived from its working-directory root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLayout {
    root: PathBuf,
}

impl JobLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The working-directory root, also the reconstruction output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding extracted frames.
    #[must_use]
    pub fn frames_dir(&self) -> PathBuf {
        self.root.join(FRAMES_DIR)
    }

    /// Directory holding the three-file sparse reconstruction model.
    #[must_use]
    pub fn sparse_model_dir(&self) -> PathBuf {
        SPARSE_MODEL_DIR
            .iter()
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Sparse model path relative to the root, as passed to data preparation.
    #[must_use]
    pub fn sparse_model_relative() -> PathBuf {
        SPARSE_MODEL_DIR.iter().collect()
    }

    /// Calibration/transform marker file.
    #[must_use]
    pub fn calibration_file(&self) -> PathBuf {
        self.root.join(CALIBRATION_FILE)
    }

    /// Point cloud derived from the reconstruction.
    #[must_use]
    pub fn derived_point_cloud(&self) -> PathBuf {
        self.root.join(DERIVED_POINT_CLOUD)
    }

    /// Downscaled image cache directories.
    #[must_use]
    pub fn image_cache_dirs(&self) -> Vec<PathBuf> {
        IMAGE_CACHE_DIRS.iter().map(|dir| self.root.join(dir)).collect()
    }

    /// Root under which the trainer creates its timestamped run directories.
    #[must_use]
    pub fn training_dir(&self) -> PathBuf {
        self.root.join(TRAINING_DIR)
    }

    /// Directory the export step writes into.
    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.root.join(EXPORT_DIR)
    }

    /// The final exported point cloud.
    #[must_use]
    pub fn export_file(&self) -> PathBuf {
        self.export_dir().join(EXPORT_FILE)
    }

    /// The artifacts `stage` produces and what resetting it deletes.
    #[must_use]
    pub fn artifacts(&self, stage: Stage) -> ArtifactSet {
        match stage {
            Stage::FrameExtraction => ArtifactSet::new(
                stage,
                ArtifactCheck::NonEmptyDir {
                    dir: self.frames_dir(),
                },
            )
            .with_purge(PurgeTarget::contents(self.frames_dir())),
            Stage::SceneReconstruction => ArtifactSet::new(
                stage,
                ArtifactCheck::FixedFiles {
                    dir: self.sparse_model_dir(),
                    count: SPARSE_MODEL_FILE_COUNT,
                    min_bytes: MIN_MODEL_FILE_BYTES,
                },
            )
            .with_purge(PurgeTarget::tree(self.sparse_model_dir())),
            Stage::NeuralTraining => {
                let mut set = ArtifactSet::new(
                    stage,
                    ArtifactCheck::AllFiles {
                        files: vec![self.calibration_file(), self.export_file()],
                    },
                )
                .with_purge(PurgeTarget::tree(self.calibration_file()))
                .with_purge(PurgeTarget::tree(self.derived_point_cloud()));
                for dir in self.image_cache_dirs() {
                    set = set.with_purge(PurgeTarget::tree(dir));
                }
                set.with_purge(PurgeTarget::tree(self.training_dir()))
                    .with_purge(PurgeTarget::tree(self.export_dir()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = JobLayout::new("/lessons/intro_1");

        assert_eq!(layout.frames_dir(), PathBuf::from("/lessons/intro_1/input"));
        assert_eq!(
            layout.sparse_model_dir(),
            PathBuf::from("/lessons/intro_1/colmap/sparse/0")
        );
        assert_eq!(
            layout.export_file(),
            PathBuf::from("/lessons/intro_1/splat/splat.ply")
        );
        assert_eq!(
            JobLayout::sparse_model_relative(),
            PathBuf::from("colmap/sparse/0")
        );
    }

    #[test]
    fn test_training_artifacts_cover_downstream_state() {
        let layout = JobLayout::new("/job");
        let set = layout.artifacts(Stage::NeuralTraining);

        assert!(set.purges(&layout.calibration_file()));
        assert!(set.purges(&layout.derived_point_cloud()));
        for dir in layout.image_cache_dirs() {
            assert!(set.purges(&dir));
        }
        assert!(set.purges(&layout.training_dir()));
        assert!(set.purges(&layout.export_dir()));
        assert!(!set.purges(&layout.sparse_model_dir()));
    }

    #[test]
    fn test_frame_reset_keeps_directory() {
        let layout = JobLayout::new("/job");
        let set = layout.artifacts(Stage::FrameExtraction);
        assert_eq!(set.purge, vec![PurgeTarget::contents("/job/input")]);
    }
}
