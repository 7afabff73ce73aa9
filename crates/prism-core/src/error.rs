//! Error types for the Prism pipeline.
//!
//! Stage failures are carried as data on pending handles rather than returned
//! across stage boundaries, so `PipelineError` is `Clone` and records the URL
//! (and filter, where relevant) that failed.

use serde::Serialize;
use thiserror::Error;

/// Top-level error type for Prism operations.
#[derive(Error, Debug)]
pub enum PrismError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A pipeline error that escaped a single branch
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// The worker pool could not run the batch
    #[error("Worker pool failure: {0}")]
    Pool(String),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-branch pipeline errors, organized by stage.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineError {
    /// Cache membership lookup failed (treated as a cache miss)
    #[error("Cache lookup failed for {url}: {message}")]
    CacheLookup { url: String, message: String },

    /// Download failed
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Downloaded bytes could not be decoded as an image
    #[error("Decode error for {url}: {message}")]
    Decode { url: String, message: String },

    /// Download or decoded image exceeds a configured limit
    #[error("Image too large: {url} ({detail})")]
    TooLarge { url: String, detail: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {url} after {timeout_ms}ms")]
    Timeout {
        url: String,
        stage: String,
        filter: Option<String>,
        timeout_ms: u64,
    },

    /// A filter failed to transform or persist its output
    #[error("Filter '{filter}' failed for {url}: {message}")]
    Filter {
        url: String,
        filter: String,
        message: String,
    },

    /// A stage panicked instead of returning
    #[error("Stage panicked: {message}")]
    Panicked { message: String },

    /// The worker pool refused new work
    #[error("Worker pool is closed")]
    PoolClosed,

    /// A pending result was dropped before it was resolved, i.e. the runtime
    /// discarded queued work
    #[error("Pending result was abandoned before resolution")]
    Abandoned,
}

/// Coarse classification of a failure, as reported in batch summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The URL's branch failed before any filter ran
    Fetch,
    /// A single filter failed on a single image
    Filter,
    /// The worker pool failed or lost work; fatal to the batch
    Pool,
}

impl PipelineError {
    /// Classify this error for reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Filter { .. } => FailureKind::Filter,
            PipelineError::Timeout { filter: Some(_), .. } => FailureKind::Filter,
            PipelineError::PoolClosed | PipelineError::Abandoned => FailureKind::Pool,
            _ => FailureKind::Fetch,
        }
    }

    /// The URL this error refers to, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            PipelineError::CacheLookup { url, .. }
            | PipelineError::Fetch { url, .. }
            | PipelineError::Decode { url, .. }
            | PipelineError::TooLarge { url, .. }
            | PipelineError::Timeout { url, .. }
            | PipelineError::Filter { url, .. } => Some(url),
            PipelineError::Panicked { .. }
            | PipelineError::PoolClosed
            | PipelineError::Abandoned => None,
        }
    }

    /// The filter this error refers to, if any.
    pub fn filter(&self) -> Option<&str> {
        match self {
            PipelineError::Filter { filter, .. } => Some(filter),
            PipelineError::Timeout { filter, .. } => filter.as_deref(),
            _ => None,
        }
    }
}

/// Convenience type alias for Prism results.
pub type Result<T> = std::result::Result<T, PrismError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
