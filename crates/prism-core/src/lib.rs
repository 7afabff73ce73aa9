//! Prism Core - concurrent batch image pipeline.
//!
//! Prism takes batches of image URLs, skips the ones whose outputs are already
//! on disk, downloads the rest, and runs every configured filter on every
//! downloaded image. Each batch has exactly one completion point.
//!
//! # Architecture
//!
//! ```text
//! URL → CacheGate → Fetcher → FilterBinder → FilterRunner ×N
//!                                                 │
//!                       join_all (per image, then per batch) → BatchSummary
//! ```
//!
//! Every stage returns a [`PendingResult`] immediately and runs on the shared
//! [`WorkerPool`]. Collaborators sit behind [`CacheStore`], [`Downloader`], and
//! [`ImageFilter`], so tests and embedders can swap any of them.
//!
//! # Usage
//!
//! ```rust,ignore
//! use prism_core::{Config, Pipeline, Url, WorkerPool};
//!
//! #[tokio::main]
//! async fn main() -> prism_core::Result<()> {
//!     let config = Config::load()?;
//!     let pool = WorkerPool::current(config.pool.workers)?;
//!     let pipeline = Pipeline::from_config(&config, pool)?;
//!
//!     let urls = vec![Url::parse("https://example.com/cat.jpg").unwrap()];
//!     let summary = pipeline.process_batch(&urls).await?;
//!     println!("{} outputs, {} failures", summary.processed_count, summary.failures.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod filters;
pub mod join;
pub mod output;
pub mod pending;
pub mod pipeline;
pub mod pool;
pub mod store;
pub mod types;

pub use cache::{CacheStore, DiskCache};
pub use config::Config;
pub use download::{Downloader, HttpDownloader};
pub use error::{ConfigError, FailureKind, PipelineError, PipelineResult, PrismError, Result};
pub use filters::{build_filters, ImageFilter, FILTER_NAMES};
pub use join::{join_all, Joined};
pub use output::{OutputFormat, OutputWriter};
pub use pending::{PendingResult, Promise};
pub use pipeline::{CacheDecision, FilterTask, Image, Pipeline};
pub use pool::WorkerPool;
pub use reqwest::Url;
pub use store::OutputStore;
pub use types::{BatchFailure, BatchSummary, PersistedOutput};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
