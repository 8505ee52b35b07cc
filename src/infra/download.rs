//! Archive downloads
//!
//! Fetches module source archives over HTTP with retry and exponential
//! backoff, hashing the stream as it lands so checksum verification
//! never needs a second pass over the file.

use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::defaults;
use crate::error::CloneError;

/// Downloaded archive metadata
#[derive(Debug)]
pub struct Fetched {
    /// Size in bytes
    pub size: u64,
    /// SHA256 of the downloaded content
    pub checksum: String,
}

/// HTTP fetcher for module archives
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: reqwest::Client,
    max_retries: u32,
    base_delay_ms: u64,
}

impl ArchiveFetcher {
    /// Create a fetcher with the default retry policy
    pub fn new() -> Self {
        Self::with_retries(defaults::MAX_DOWNLOAD_RETRIES, 1000)
    }

    /// Create a fetcher with a custom retry count and backoff base
    pub fn with_retries(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .connect_timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            max_retries,
            base_delay_ms,
        }
    }

    /// Download an archive, retrying transient failures.
    ///
    /// When an expected checksum is given the downloaded file must match
    /// it; a mismatch deletes the file and fails the fetch. Partial
    /// downloads never survive a failure.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<Fetched, CloneError> {
        let mut last_error = None;
        let mut delay_ms = self.base_delay_ms;

        for attempt in 1..=self.max_retries {
            match self.fetch_once(url, dest).await {
                Ok(fetched) => {
                    if let Some(expected) = expected_sha256 {
                        if !fetched.checksum.eq_ignore_ascii_case(expected) {
                            let _ = tokio::fs::remove_file(dest).await;
                            return Err(CloneError::ChecksumMismatch {
                                url: url.to_string(),
                                expected: expected.to_lowercase(),
                                actual: fetched.checksum,
                            });
                        }
                    }
                    return Ok(fetched);
                }
                Err(e) => {
                    tracing::warn!("Download attempt {attempt}/{} failed: {e}", self.max_retries);
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(30_000);
                    }
                }
            }
        }

        let _ = tokio::fs::remove_file(dest).await;
        Err(last_error.unwrap_or_else(|| CloneError::DownloadFailed {
            url: url.to_string(),
            error: "no attempts made".to_string(),
        }))
    }

    async fn fetch_once(&self, url: &str, dest: &Path) -> Result<Fetched, CloneError> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| CloneError::DownloadFailed {
                    url: url.to_string(),
                    error: e.to_string(),
                })?;

        if !response.status().is_success() {
            return Err(CloneError::DownloadFailed {
                url: url.to_string(),
                error: format!("HTTP {}", response.status()),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CloneError::IoError {
                    path: parent.to_path_buf(),
                    error: e.to_string(),
                })?;
        }

        let mut file = File::create(dest).await.map_err(|e| CloneError::IoError {
            path: dest.to_path_buf(),
            error: e.to_string(),
        })?;

        let mut hasher = Sha256::new();
        let mut size: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CloneError::DownloadFailed {
                url: url.to_string(),
                error: e.to_string(),
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| CloneError::IoError {
                    path: dest.to_path_buf(),
                    error: e.to_string(),
                })?;
            hasher.update(&chunk);
            size += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| CloneError::IoError {
            path: dest.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(Fetched {
            size,
            checksum: hex::encode(hasher.finalize()),
        })
    }
}

impl Default for ArchiveFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the SHA256 of in-memory data
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
