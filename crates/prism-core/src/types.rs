//! Core data types reported by the Prism pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{FailureKind, PipelineError};

/// One filtered variant written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedOutput {
    /// Source URL of the image
    pub url: String,

    /// Name of the filter that produced this variant
    pub filter: String,

    /// Where the variant was stored
    pub path: PathBuf,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Encoded size on disk
    pub bytes_written: u64,
}

/// A failed branch of a batch: either a whole URL or one filter on one URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    /// URL whose branch failed
    pub url: String,

    /// Filter that failed, or `None` when the URL failed before filtering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Coarse failure class
    pub kind: FailureKind,

    /// The underlying error
    pub cause: PipelineError,
}

impl BatchFailure {
    /// Build a failure record for `url`, taking the filter from the error.
    pub fn new(url: impl Into<String>, cause: PipelineError) -> Self {
        Self {
            url: url.into(),
            filter: cause.filter().map(str::to_string),
            kind: cause.kind(),
            cause,
        }
    }
}

/// Result of processing one batch of URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Number of URLs submitted in the batch
    pub input_count: usize,

    /// Number of filter tasks that completed and persisted an output
    pub processed_count: usize,

    /// Number of URLs skipped because their outputs already exist
    pub cached_count: usize,

    /// Wall-clock time for the batch
    pub elapsed_ms: u64,

    /// Every persisted output, in submission order
    pub outputs: Vec<PersistedOutput>,

    /// Every failed branch, in submission order
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    /// An empty summary for a batch of `input_count` URLs.
    pub fn new(input_count: usize) -> Self {
        Self {
            input_count,
            ..Self::default()
        }
    }

    /// Whether every non-cached URL was fully processed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of URLs that went through download (processed or failed).
    pub fn fetched_count(&self) -> usize {
        self.input_count - self.cached_count
    }
}
