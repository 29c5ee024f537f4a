//! Temporary job directories for pipeline tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::layout::JobLayout;
use crate::tools::TRAINING_CONFIG_FILE;

/// Size used for reconstruction model files that pass the size check.
const VALID_MODEL_FILE_BYTES: usize = 4096;

/// Names of the files a reconstruction produces.
pub(crate) const MODEL_FILE_NAMES: [&str; 3] = ["cameras.bin", "images.bin", "points3D.bin"];

/// Writes `size` bytes to `path`, creating parent directories.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_sized_file(path: &Path, size: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, vec![b'x'; size]).expect("write fixture file");
}

/// A job working directory inside a temporary directory.
///
/// The job root is `<tmp>/job`; the source video lives next to it so a
/// reset of the job never touches it.
#[derive(Debug)]
pub struct JobFixture {
    dir: TempDir,
    layout: JobLayout,
}

impl Default for JobFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFixture {
    /// Creates an empty job directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let layout = JobLayout::new(dir.path().join("job"));
        fs::create_dir_all(layout.root()).expect("create job root");
        Self { dir, layout }
    }

    /// The job layout.
    #[must_use]
    pub fn layout(&self) -> &JobLayout {
        &self.layout
    }

    /// The job root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Writes a small source video and returns its path.
    #[must_use]
    pub fn write_video(&self) -> PathBuf {
        let path = self.dir.path().join("source.mp4");
        write_sized_file(&path, 256);
        path
    }

    /// Writes `count` frames.
    pub fn write_frames(&self, count: usize) {
        for index in 0..count {
            let name = format!("frame_{:05}.png", index + 1);
            write_sized_file(&self.layout.frames_dir().join(name), 64);
        }
    }

    /// Writes one file of `size` bytes into the sparse model directory.
    pub fn write_model_file(&self, name: &str, size: usize) {
        write_sized_file(&self.layout.sparse_model_dir().join(name), size);
    }

    /// Writes a complete three-file reconstruction.
    pub fn write_valid_reconstruction(&self) {
        for name in MODEL_FILE_NAMES {
            self.write_model_file(name, VALID_MODEL_FILE_BYTES);
        }
    }

    /// Writes the calibration marker.
    pub fn write_calibration(&self) {
        fs::write(self.layout.calibration_file(), r#"{"frames": []}"#)
            .expect("write calibration");
    }

    /// Writes everything data preparation produces besides the calibration.
    pub fn write_prepared_data(&self) {
        self.write_calibration();
        write_sized_file(&self.layout.derived_point_cloud(), 128);
        for dir in self.layout.image_cache_dirs() {
            write_sized_file(&dir.join("frame_00001.png"), 32);
        }
    }

    /// Writes a trainer run tree and returns the config path.
    #[must_use]
    pub fn write_training_run(&self, timestamp: &str) -> PathBuf {
        let config = self
            .layout
            .training_dir()
            .join("unnamed")
            .join("splatfacto")
            .join(timestamp)
            .join(TRAINING_CONFIG_FILE);
        write_sized_file(&config, 16);
        config
    }

    /// Writes the exported point cloud.
    pub fn write_export(&self) {
        write_sized_file(&self.layout.export_file(), 512);
    }

    /// Writes valid output for every stage.
    pub fn write_complete_job(&self) {
        self.write_frames(3);
        self.write_valid_reconstruction();
        self.write_prepared_data();
        let _ = self.write_training_run("2024-01-01_000000");
        self.write_export();
    }
}
