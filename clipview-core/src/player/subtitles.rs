//! Subtitle track retrieval.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Subtitle failures. Never fatal: the preview plays without captions.
#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("subtitle request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("subtitle request returned status {status}")]
    Status { status: u16 },

    #[error("subtitle file is empty")]
    Empty,
}

/// Fetches a subtitle resource as raw bytes.
#[async_trait]
pub trait SubtitleFetcher: Send + Sync {
    /// # Errors
    ///
    /// - `SubtitleError` - The track could not be retrieved
    async fn fetch(&self, url: &str) -> Result<Bytes, SubtitleError>;
}

/// Fetches subtitles from the upstream file API.
///
/// Root-relative URLs are resolved against the upstream origin.
#[derive(Debug, Clone)]
pub struct HttpSubtitleFetcher {
    client: reqwest::Client,
    upstream_origin: String,
}

impl HttpSubtitleFetcher {
    /// # Errors
    ///
    /// - `SubtitleError::Request` - The HTTP client could not be built
    pub fn new(
        upstream_origin: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, SubtitleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self::with_client(client, upstream_origin))
    }

    pub fn with_client(client: reqwest::Client, upstream_origin: impl Into<String>) -> Self {
        Self {
            client,
            upstream_origin: upstream_origin.into().trim_end_matches('/').to_string(),
        }
    }

    /// Absolute form of `url`.
    pub fn absolute(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{url}", self.upstream_origin)
        } else {
            url.to_string()
        }
    }
}

#[async_trait]
impl SubtitleFetcher for HttpSubtitleFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, SubtitleError> {
        let response = self.client.get(self.absolute(url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubtitleError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(SubtitleError::Empty);
        }
        Ok(body)
    }
}
