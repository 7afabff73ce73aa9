//! Cache membership for already-processed URLs.

use async_trait::async_trait;
use reqwest::Url;

use crate::error::{PipelineError, PipelineResult};
use crate::store::OutputStore;

/// Answers whether a URL's outputs already exist locally.
///
/// Uses `async_trait` so the pipeline can hold an `Arc<dyn CacheStore>`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether `url` is already cached.
    async fn contains(&self, url: &Url) -> PipelineResult<bool>;
}

/// Treats a URL as cached once every filter has written its output for it.
#[derive(Debug, Clone)]
pub struct DiskCache {
    store: OutputStore,
    filters: Vec<String>,
}

impl DiskCache {
    /// Create a disk cache for the given store and filter names.
    pub fn new(store: OutputStore, filters: Vec<String>) -> Self {
        Self { store, filters }
    }
}

#[async_trait]
impl CacheStore for DiskCache {
    async fn contains(&self, url: &Url) -> PipelineResult<bool> {
        if self.filters.is_empty() {
            return Ok(false);
        }
        for filter in &self.filters {
            let path = self.store.path_for(filter, url);
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|e| PipelineError::CacheLookup {
                    url: url.to_string(),
                    message: format!("{}: {e}", path.display()),
                })?;
            if !exists {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
