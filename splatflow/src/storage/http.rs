//! S3-compatible object store over plain HTTP (path-style addressing).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::StreamExt;
use md5::{Digest, Md5};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{sha256_hex, ObjectStore, StoredObject};
use crate::errors::{Result, SplatflowError};

/// Per-request timeout for storage calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Talks to `<endpoint>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    public_base_url: String,
}

impl HttpObjectStore {
    /// Creates a store for `bucket` at `endpoint`.
    ///
    /// Objects are advertised under `public_base_url`, which defaults to the
    /// bucket URL when empty.
    pub fn new(endpoint: &str, bucket: &str, public_base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SplatflowError::storage(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, endpoint, bucket, public_base_url))
    }

    /// Creates a store reusing an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, endpoint: &str, bucket: &str, public_base_url: &str) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let public_base_url = if public_base_url.is_empty() {
            format!("{endpoint}/{bucket}")
        } else {
            public_base_url.trim_end_matches('/').to_string()
        };
        Self {
            client,
            endpoint,
            bucket: bucket.to_string(),
            public_base_url,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key.trim_start_matches('/'))
    }

    async fn ensure_success(response: reqwest::Response, action: &str, key: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SplatflowError::storage(format!(
            "{action} '{key}' failed with HTTP {}: {body}",
            status.as_u16()
        )))
    }
}

/// Base64 of the MD5 digest, as sent in `Content-MD5`.
pub(super) fn content_md5(bytes: &[u8]) -> String {
    STANDARD.encode(Md5::digest(bytes))
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn fetch(&self, key: &str, dest: &Path) -> Result<u64> {
        let url = self.object_url(key);
        tracing::info!(key, url = %url, "Fetching object");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SplatflowError::storage(format!("fetch '{key}' failed: {e}")))?;
        let response = Self::ensure_success(response, "fetch", key).await?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SplatflowError::storage(format!("fetch '{key}' interrupted: {e}")))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!(key, bytes = written, "Fetched object");
        Ok(written)
    }

    async fn put(&self, key: &str, source: &Path) -> Result<StoredObject> {
        let bytes = fs::read(source).await?;
        let size = bytes.len() as u64;
        let sha256 = sha256_hex(&bytes);
        let url = self.object_url(key);
        tracing::info!(key, url = %url, bytes = size, "Uploading object");

        let response = self
            .client
            .put(&url)
            .header("Content-MD5", content_md5(&bytes))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| SplatflowError::storage(format!("upload '{key}' failed: {e}")))?;
        Self::ensure_success(response, "upload", key).await?;

        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key),
            size,
            sha256,
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_style_urls() {
        let store = HttpObjectStore::with_client(
            reqwest::Client::new(),
            "http://minio:9000/",
            "lessons",
            "",
        );
        assert_eq!(store.object_url("videos/a.mp4"), "http://minio:9000/lessons/videos/a.mp4");
        assert_eq!(store.public_url("/splats/a.ply"), "http://minio:9000/lessons/splats/a.ply");
    }

    #[test]
    fn test_public_base_url_override() {
        let store = HttpObjectStore::with_client(
            reqwest::Client::new(),
            "http://minio:9000",
            "lessons",
            "https://cdn.example.com/",
        );
        assert_eq!(store.public_url("splats/a.ply"), "https://cdn.example.com/splats/a.ply");
    }

    #[test]
    fn test_content_md5() {
        // MD5 of the empty body.
        assert_eq!(content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }
}
