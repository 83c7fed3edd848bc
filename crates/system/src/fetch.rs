//! HTTP access for release downloads, IP echo services and release feeds.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use wte_common::{Error, Result};

/// Trait for fetching remote resources.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET a URL and return its body as text. Non-2xx responses fail.
    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String>;

    /// GET a URL into `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path, timeout: Duration) -> Result<u64>;
}

/// [`Fetcher`] backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("wte/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str, timeout: Duration) -> Result<reqwest::Response> {
        let download_error = |reason: String| Error::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github.v3+json, */*")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP {}", status)));
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String> {
        debug!("GET {}", url);
        self.send(url, timeout)
            .await?
            .text()
            .await
            .map_err(|e| Error::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn download(&self, url: &str, dest: &Path, timeout: Duration) -> Result<u64> {
        debug!("Downloading {} to {:?}", url, dest);
        let mut response = self.send(url, timeout).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(|e| Error::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}
