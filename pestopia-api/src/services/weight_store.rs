//! Classifier weight store
//!
//! Provides the model blob from a local path or a remote URL. Remote downloads
//! are written to an optional cache path and read from there on later starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("pestopia-api/", env!("CARGO_PKG_VERSION"));
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Weight store errors
#[derive(Debug, Error)]
pub enum WeightStoreError {
    #[error("Weight file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error reading weights: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error downloading weights: {0}")]
    Network(String),

    #[error("Weight download from {url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("Weight blob is empty")]
    Empty,
}

/// Where the weights live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightSource {
    LocalPath(PathBuf),
    RemoteUrl(String),
}

impl WeightSource {
    /// Interpret a configured location: `http(s)://` URLs are remote, anything else is a path
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            WeightSource::RemoteUrl(trimmed.to_string())
        } else {
            WeightSource::LocalPath(PathBuf::from(trimmed))
        }
    }
}

/// Weight store client
pub struct WeightStore {
    source: WeightSource,
    cache_path: Option<PathBuf>,
    http_client: reqwest::Client,
}

impl WeightStore {
    pub fn new(source: WeightSource, cache_path: Option<PathBuf>) -> Result<Self, WeightStoreError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| WeightStoreError::Network(e.to_string()))?;

        Ok(Self {
            source,
            cache_path,
            http_client,
        })
    }

    pub fn source(&self) -> &WeightSource {
        &self.source
    }

    /// Fetch the full weight blob
    pub async fn fetch(&self) -> Result<Vec<u8>, WeightStoreError> {
        match &self.source {
            WeightSource::LocalPath(path) => read_local(path).await,
            WeightSource::RemoteUrl(url) => {
                if let Some(cache) = &self.cache_path {
                    if cache.exists() {
                        info!("Using cached model weights at {}", cache.display());
                        return read_local(cache).await;
                    }
                }

                let bytes = self.download(url).await?;

                if let Some(cache) = &self.cache_path {
                    // Best-effort: a failed cache write only costs a re-download next start
                    if let Err(e) = write_cache(cache, &bytes).await {
                        warn!("Failed to cache model weights at {}: {}", cache.display(), e);
                    }
                }

                Ok(bytes)
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, WeightStoreError> {
        info!(url = %url, "Downloading model weights");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| WeightStoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeightStoreError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WeightStoreError::Network(e.to_string()))?;

        if bytes.is_empty() {
            return Err(WeightStoreError::Empty);
        }

        debug!(bytes = bytes.len(), "Model weights downloaded");
        Ok(bytes.to_vec())
    }
}

async fn read_local(path: &Path) -> Result<Vec<u8>, WeightStoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WeightStoreError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(WeightStoreError::Io(e)),
    };

    if bytes.is_empty() {
        return Err(WeightStoreError::Empty);
    }
    Ok(bytes)
}

async fn write_cache(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("part");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
