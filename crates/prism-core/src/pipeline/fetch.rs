//! Async fetcher: URL to shared decoded image.

use reqwest::Url;
use std::sync::Arc;

use crate::download::Downloader;
use crate::error::PipelineError;
use crate::pending::{catch_panic, PendingResult};
use crate::pool::WorkerPool;

use super::decode::{Image, ImageDecoder};

/// Downloads and decodes images on the worker pool.
#[derive(Clone)]
pub struct Fetcher {
    pool: WorkerPool,
    downloader: Arc<dyn Downloader>,
    decoder: ImageDecoder,
}

impl Fetcher {
    /// Create a fetcher using `downloader` for transport.
    pub fn new(pool: WorkerPool, downloader: Arc<dyn Downloader>, decoder: ImageDecoder) -> Self {
        Self {
            pool,
            downloader,
            decoder,
        }
    }

    /// Start fetching `url`. The handle fails with the URL's error on any
    /// transport or decode problem.
    pub fn fetch(&self, url: Url) -> PendingResult<Arc<Image>> {
        let downloader = Arc::clone(&self.downloader);
        let decoder = self.decoder.clone();
        PendingResult::supply_async(&self.pool, move || async move {
            tracing::debug!("Fetching {url} via {}", downloader.name());
            let work = async {
                let bytes = downloader.download_bytes(&url).await?;
                decoder.decode(&url, bytes).await
            };
            let image = catch_panic(work).await.unwrap_or_else(|message| {
                Err(PipelineError::Fetch {
                    url: url.to_string(),
                    message: format!("panicked: {message}"),
                    status_code: None,
                })
            })?;
            tracing::debug!(
                "Decoded {url}: {}x{} {} ({} bytes)",
                image.width(),
                image.height(),
                super::decode::format_name(image.format),
                image.byte_len
            );
            Ok(Arc::new(image))
        })
    }
}
