//! Declarative description of the artifacts a stage produces.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Stage;

/// Minimum size, in bytes, a reconstruction model file must exceed.
pub const MIN_MODEL_FILE_BYTES: u64 = 1024;

/// Validity predicate over a stage's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactCheck {
    /// The directory exists and holds at least one entry.
    NonEmptyDir {
        /// Directory to inspect.
        dir: PathBuf,
    },
    /// The directory holds exactly `count` regular files, each larger than
    /// `min_bytes`.
    FixedFiles {
        /// Directory to inspect.
        dir: PathBuf,
        /// Exact number of qualifying files.
        count: usize,
        /// Exclusive lower bound on each file's size.
        min_bytes: u64,
    },
    /// Every listed file exists.
    AllFiles {
        /// Files that must all be present.
        files: Vec<PathBuf>,
    },
}

/// Something deleted when a stage's output is reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeTarget {
    /// Path to delete.
    pub path: PathBuf,
    /// Keep the directory itself and delete only its contents.
    pub keep_root: bool,
}

impl PurgeTarget {
    /// Deletes the path entirely.
    #[must_use]
    pub fn tree(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_root: false,
        }
    }

    /// Deletes the contents of a directory, keeping the directory.
    #[must_use]
    pub fn contents(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_root: true,
        }
    }
}

/// The set of files a stage is expected to produce at a known location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    /// The producing stage.
    pub stage: Stage,
    /// How completeness is judged.
    pub check: ArtifactCheck,
    /// What a reset of this stage deletes.
    pub purge: Vec<PurgeTarget>,
}

impl ArtifactSet {
    /// Creates a new artifact set.
    #[must_use]
    pub fn new(stage: Stage, check: ArtifactCheck) -> Self {
        Self {
            stage,
            check,
            purge: Vec::new(),
        }
    }

    /// Adds a purge target.
    #[must_use]
    pub fn with_purge(mut self, target: PurgeTarget) -> Self {
        self.purge.push(target);
        self
    }

    /// Returns true if `path` is deleted by a reset of this stage.
    #[must_use]
    pub fn purges(&self, path: &Path) -> bool {
        self.purge.iter().any(|target| target.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_set_purge() {
        let set = ArtifactSet::new(
            Stage::SceneReconstruction,
            ArtifactCheck::FixedFiles {
                dir: PathBuf::from("/job/colmap/sparse/0"),
                count: 3,
                min_bytes: MIN_MODEL_FILE_BYTES,
            },
        )
        .with_purge(PurgeTarget::tree("/job/colmap/sparse/0"));

        assert!(set.purges(Path::new("/job/colmap/sparse/0")));
        assert!(!set.purges(Path::new("/job/input")));
        assert!(!set.purge[0].keep_root);
    }

    #[test]
    fn test_artifact_check_serialization() {
        let check = ArtifactCheck::NonEmptyDir {
            dir: PathBuf::from("/job/input"),
        };
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["kind"], "non_empty_dir");

        let back: ArtifactCheck = serde_json::from_value(json).unwrap();
        assert_eq!(back, check);
    }
}
