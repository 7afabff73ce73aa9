//! Cache gate: decides per URL whether any work is needed.

use reqwest::Url;
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::pending::{catch_panic, PendingResult};
use crate::pool::WorkerPool;

/// Outcome of a cache check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    /// All outputs already exist; the URL contributes no work.
    Cached,
    /// The URL must be downloaded and filtered.
    NeedsFetch(Url),
}

/// Runs cache lookups on the worker pool.
#[derive(Clone)]
pub struct CacheGate {
    pool: WorkerPool,
    cache: Arc<dyn CacheStore>,
}

impl CacheGate {
    /// Create a gate backed by `cache`.
    pub fn new(pool: WorkerPool, cache: Arc<dyn CacheStore>) -> Self {
        Self { pool, cache }
    }

    /// Check `url` against the cache.
    ///
    /// Never fails: a lookup error or panic is logged and treated as a miss.
    pub fn check(&self, url: &Url) -> PendingResult<CacheDecision> {
        let cache = Arc::clone(&self.cache);
        let url = url.clone();
        PendingResult::supply_async(&self.pool, move || async move {
            match catch_panic(cache.contains(&url)).await {
                Ok(Ok(true)) => {
                    tracing::debug!("Cache hit: {url}");
                    Ok(CacheDecision::Cached)
                }
                Ok(Ok(false)) => Ok(CacheDecision::NeedsFetch(url)),
                Ok(Err(e)) => {
                    tracing::warn!("{e}; fetching anyway");
                    Ok(CacheDecision::NeedsFetch(url))
                }
                Err(message) => {
                    tracing::warn!("Cache lookup panicked for {url}: {message}; fetching anyway");
                    Ok(CacheDecision::NeedsFetch(url))
                }
            }
        })
    }
}
