//! Image transport: turns a URL into raw bytes.
//!
//! The pipeline only sees the [`Downloader`] trait. [`HttpDownloader`] is the
//! default implementation: reqwest over rustls, with a per-request timeout,
//! a size cap enforced while streaming, and retries with exponential backoff
//! for transient failures. `file://` URLs are read from disk.

pub mod retry;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Url;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::{ConfigError, PipelineError, PipelineResult};

/// Trait that all transports implement.
///
/// Uses `async_trait` because the pipeline holds an `Arc<dyn Downloader>`.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Transport name for logging.
    fn name(&self) -> &str;

    /// Download the resource at `url`.
    async fn download_bytes(&self, url: &Url) -> PipelineResult<Vec<u8>>;
}

/// HTTP(S) and `file://` downloader.
pub struct HttpDownloader {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpDownloader {
    /// Build a downloader from the `fetch` settings.
    pub fn new(config: FetchConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ConfigError::ValidationError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn max_bytes(&self) -> u64 {
        self.config.max_download_mb.saturating_mul(1024 * 1024)
    }

    fn too_large(&self, url: &Url, size: u64) -> PipelineError {
        PipelineError::TooLarge {
            url: url.to_string(),
            detail: format!(
                "{:.1}MB > {}MB",
                size as f64 / (1024.0 * 1024.0),
                self.config.max_download_mb
            ),
        }
    }

    fn request_error(&self, url: &Url, e: reqwest::Error) -> PipelineError {
        if e.is_timeout() {
            PipelineError::Timeout {
                url: url.to_string(),
                stage: "fetch".to_string(),
                filter: None,
                timeout_ms: self.config.timeout_ms,
            }
        } else if e.is_connect() {
            PipelineError::Fetch {
                url: url.to_string(),
                message: format!("connection failed: {e}"),
                status_code: None,
            }
        } else {
            PipelineError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
                status_code: e.status().map(|s| s.as_u16()),
            }
        }
    }

    /// One HTTP attempt, streaming the body so the size cap applies early.
    async fn fetch_once(&self, url: &Url) -> PipelineResult<Vec<u8>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                message: format!("HTTP {status}"),
                status_code: Some(status.as_u16()),
            });
        }

        let max_bytes = self.max_bytes();
        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(self.too_large(url, length));
            }
        }

        let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.request_error(url, e))?;
            let size = (body.len() + chunk.len()) as u64;
            if size > max_bytes {
                return Err(self.too_large(url, size));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                message: "empty response body".to_string(),
                status_code: Some(status.as_u16()),
            });
        }
        Ok(body)
    }

    async fn read_file(&self, url: &Url) -> PipelineResult<Vec<u8>> {
        let path = url.to_file_path().map_err(|_| PipelineError::Fetch {
            url: url.to_string(),
            message: "not a local file path".to_string(),
            status_code: None,
        })?;
        let io_error = |e: std::io::Error| PipelineError::Fetch {
            url: url.to_string(),
            message: format!("{}: {e}", path.display()),
            status_code: None,
        };

        let size = tokio::fs::metadata(&path).await.map_err(io_error)?.len();
        if size > self.max_bytes() {
            return Err(self.too_large(url, size));
        }
        tokio::fs::read(&path).await.map_err(io_error)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    fn name(&self) -> &str {
        "http"
    }

    async fn download_bytes(&self, url: &Url) -> PipelineResult<Vec<u8>> {
        match url.scheme() {
            "http" | "https" => {}
            "file" => return self.read_file(url).await,
            other => {
                return Err(PipelineError::Fetch {
                    url: url.to_string(),
                    message: format!("unsupported URL scheme '{other}'"),
                    status_code: None,
                })
            }
        }

        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(bytes) => {
                    tracing::trace!("Downloaded {} bytes from {}", bytes.len(), url);
                    return Ok(bytes);
                }
                Err(e) if attempt < self.config.retry_attempts && retry::is_retryable(&e) => {
                    let delay = retry::backoff_duration(attempt, self.config.retry_delay_ms);
                    attempt += 1;
                    tracing::warn!(
                        "Retry {attempt}/{} for {url} after {delay:?}: {e}",
                        self.config.retry_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
