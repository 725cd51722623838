//! HTTP(S) media downloads with `reqwest`.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use url::Url;

use super::MediaDownloader;
use crate::config::MediaConfig;
use crate::error::{ChatError, ChatResult};

/// Downloads media from the object store's public HTTPS URLs.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpDownloader {
    pub fn new(config: &MediaConfig) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.download_timeout())
            .build()
            .map_err(|e| ChatError::Download(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config.max_download_bytes))
    }

    /// Use an existing client (shared connection pool).
    pub fn with_client(client: reqwest::Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    fn too_large(&self, url: &Url, size: u64) -> ChatError {
        ChatError::Download(format!(
            "{} is {} bytes, limit is {}",
            url, size, self.max_bytes
        ))
    }
}

#[async_trait]
impl MediaDownloader for HttpDownloader {
    async fn fetch(&self, url: &Url) -> ChatResult<Bytes> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ChatError::Download(format!("unsupported url {}", url)));
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ChatError::Download(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Download(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }
        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(self.too_large(url, len));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChatError::Download(format!("{}: {}", url, e)))?;
        if bytes.len() > self.max_bytes {
            return Err(self.too_large(url, bytes.len() as u64));
        }
        debug!(%url, size = bytes.len(), "media downloaded");
        Ok(bytes)
    }
}
