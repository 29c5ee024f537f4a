//! Filesystem-backed object store for development and tests.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use super::{sha256_hex, ObjectStore, StoredObject};
use crate::errors::{Result, SplatflowError};

/// Stores objects as files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    /// Creates a store rooted at `root`, serving objects from
    /// `public_base_url`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(SplatflowError::storage(format!("invalid object key '{key}'")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn fetch(&self, key: &str, dest: &Path) -> Result<u64> {
        let source = self.object_path(key)?;
        if !source.is_file() {
            return Err(SplatflowError::storage(format!("object '{key}' not found")));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(fs::copy(&source, dest).await?)
    }

    async fn put(&self, key: &str, source: &Path) -> Result<StoredObject> {
        let target = self.object_path(key)?;
        let bytes = fs::read(source).await?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &bytes).await?;

        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key),
            size: bytes.len() as u64,
            sha256: sha256_hex(&bytes),
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("bucket"), "http://files.local/");
        let source = dir.path().join("splat.ply");
        std::fs::write(&source, b"ply").unwrap();

        let stored = store.put("splats/a_1/splat.ply", &source).await.unwrap();
        assert_eq!(stored.url, "http://files.local/splats/a_1/splat.ply");
        assert_eq!(stored.size, 3);
        assert_eq!(stored.sha256, sha256_hex(b"ply"));

        let dest = dir.path().join("out/copy.ply");
        let size = store.fetch("splats/a_1/splat.ply", &dest).await.unwrap();
        assert_eq!(size, 3);
        assert_eq!(std::fs::read(dest).unwrap(), b"ply");
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://files.local");
        let err = store.fetch("nope.mp4", &dir.path().join("x")).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://files.local");
        assert!(store.fetch("../etc/passwd", &dir.path().join("x")).await.is_err());
        assert!(store.fetch("/etc/passwd", &dir.path().join("x")).await.is_err());
    }
}
