use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use sha2::{Digest, Sha256};
use url::Url;

use crate::errors::ResolveError;

use super::cache::PathCache;

/// Where a piece of media lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    /// File on the local filesystem
    Local(PathBuf),
    /// `http(s)` URL, downloaded on first use
    Remote(Url),
}

impl MediaRef {
    pub fn parse(reference: &str) -> Result<Self, ResolveError> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(ResolveError::InvalidReference("empty reference".to_string()));
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(trimmed)
                .map_err(|e| ResolveError::InvalidReference(format!("{}: {}", trimmed, e)))?;
            return Ok(Self::Remote(url));
        }

        if trimmed.contains("://") {
            return Err(ResolveError::InvalidReference(format!(
                "unsupported scheme in {}",
                trimmed
            )));
        }

        Ok(Self::Local(PathBuf::from(trimmed)))
    }
}

/// Deterministic download name: first 16 hex chars of the URL's SHA-256 plus its extension
pub fn download_file_name(url: &Url) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();

    let extension = Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());

    format!("{}.{}", hex, extension)
}

/// Turns media references into local files, downloading remote ones once
#[derive(Clone)]
pub struct MediaResolver {
    client: Client,
    download_dir: PathBuf,
    cache: PathCache,
    timeout: Duration,
}

impl MediaResolver {
    pub fn new(download_dir: PathBuf, cache: PathCache, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            download_dir,
            cache,
            timeout,
        }
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    /// Resolve a reference to an existing local file
    pub async fn resolve(&self, reference: &str) -> Result<PathBuf, ResolveError> {
        if let Some(path) = self.cache.get(reference) {
            return Ok(path);
        }

        let path = match MediaRef::parse(reference)? {
            MediaRef::Local(path) => {
                if !path.is_file() {
                    return Err(ResolveError::NotFound(path));
                }
                path
            }
            MediaRef::Remote(url) => self.download(&url).await?,
        };

        self.cache.insert(reference, &path);
        Ok(path)
    }

    async fn download(&self, url: &Url) -> Result<PathBuf, ResolveError> {
        let target = self.download_dir.join(download_file_name(url));
        let failed = |message: String| ResolveError::DownloadFailed {
            url: url.to_string(),
            message,
        };

        info!("Downloading {}", url);
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let body = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        if body.is_empty() {
            return Err(failed("empty response body".to_string()));
        }

        tokio::fs::create_dir_all(&self.download_dir).await?;
        tokio::fs::write(&target, &body).await?;
        debug!("Stored {} bytes from {} at {}", body.len(), url, target.display());

        Ok(target)
    }
}
