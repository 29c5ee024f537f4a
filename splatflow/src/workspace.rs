//! Exclusive ownership of job working directories.
//!
//! A job owns its directory tree for as long as it runs. Claims live in an
//! in-process registry and are released when the returned guard is dropped.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{Result, SplatflowError};
use crate::utils::{now_utc, Timestamp};

/// Who holds a directory and since when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimInfo {
    /// Free-form owner label, e.g. a lesson identifier.
    pub owner: String,
    /// When the claim was taken.
    pub claimed_at: Timestamp,
}

/// Registry of directories currently in use.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceRegistry {
    claims: Arc<DashMap<PathBuf, ClaimInfo>>,
}

impl WorkspaceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `path` for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`SplatflowError::WorkspaceBusy`] if the directory is already
    /// claimed.
    pub fn claim(&self, path: impl Into<PathBuf>, owner: impl Into<String>) -> Result<WorkspaceClaim> {
        let path = path.into();
        match self.claims.entry(path.clone()) {
            Entry::Occupied(existing) => {
                tracing::warn!(
                    path = %path.display(),
                    owner = %existing.get().owner,
                    "Working directory is busy"
                );
                Err(SplatflowError::WorkspaceBusy(path))
            }
            Entry::Vacant(slot) => {
                slot.insert(ClaimInfo {
                    owner: owner.into(),
                    claimed_at: now_utc(),
                });
                tracing::debug!(path = %path.display(), "Claimed working directory");
                Ok(WorkspaceClaim {
                    claims: Arc::clone(&self.claims),
                    path,
                })
            }
        }
    }

    /// Returns the claim on `path`, if any.
    #[must_use]
    pub fn holder(&self, path: &Path) -> Option<ClaimInfo> {
        self.claims.get(path).map(|claim| claim.value().clone())
    }

    /// Number of directories currently claimed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns true if nothing is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Exclusive hold on one working directory; released on drop.
#[derive(Debug)]
pub struct WorkspaceClaim {
    claims: Arc<DashMap<PathBuf, ClaimInfo>>,
    path: PathBuf,
}

impl WorkspaceClaim {
    /// The claimed directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkspaceClaim {
    fn drop(&mut self) {
        self.claims.remove(&self.path);
        tracing::debug!(path = %self.path.display(), "Released working directory");
    }
}
