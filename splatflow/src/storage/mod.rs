//! Object storage for source videos and exported point clouds.
//!
//! The pipeline itself never touches storage; the HTTP service fetches the
//! video before a run and uploads the export afterwards.

#[cfg(feature = "server")]
mod http;
mod keys;
mod local;

#[cfg(feature = "server")]
pub use http::HttpObjectStore;
pub use keys::{decode_base64_key, object_key_from_url, pad_base64};
pub use local::LocalObjectStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::errors::Result;

/// An object written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Object key within the bucket.
    pub key: String,
    /// Publicly reachable URL of the object.
    pub url: String,
    /// Size in bytes.
    pub size: u64,
    /// Hex-encoded SHA-256 of the content.
    pub sha256: String,
}

/// Fetch and put objects by key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Downloads `key` into the file at `dest`, returning the byte count.
    async fn fetch(&self, key: &str, dest: &Path) -> Result<u64>;

    /// Uploads the file at `source` under `key`.
    async fn put(&self, key: &str, source: &Path) -> Result<StoredObject>;

    /// The public URL an object under `key` is served from.
    fn public_url(&self, key: &str) -> String;
}

/// Hex-encoded SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Key under which the exported point cloud of a lesson is stored.
#[must_use]
pub fn splat_object_key(lesson_dir_name: &str) -> String {
    format!("splats/{lesson_dir_name}/splat.ply")
}
