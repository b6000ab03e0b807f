//! HTTP downloads for small bootstrap artifacts.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::error::BootstrapError;

/// Fetches a URL into a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` and writes the body to `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), BootstrapError>;
}

/// Downloader backed by `reqwest`.
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    /// Creates a downloader with the crate's user agent.
    pub fn new() -> Result<Self, BootstrapError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("colabgame-setup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BootstrapError::Download {
                url: String::new(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), BootstrapError> {
        let fail = |reason: String| BootstrapError::Download {
            url: url.to_string(),
            reason,
        };

        info!("Downloading {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(fail(format!("server returned {status}")));
        }

        let body = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        tokio::fs::write(dest, &body).await?;
        Ok(())
    }
}
