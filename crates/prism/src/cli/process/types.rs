//! CLI types for the process command: output format and per-batch records.

use clap::ValueEnum;
use prism_core::BatchSummary;
use serde::Serialize;

/// Supported output formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON array of batch records
    Json,
    /// One batch record per line (newline-delimited)
    Jsonl,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl From<OutputFormat> for prism_core::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => prism_core::OutputFormat::Json,
            OutputFormat::Jsonl => prism_core::OutputFormat::JsonLines,
        }
    }
}

/// One emitted record: a batch summary tagged with its position in the run.
#[derive(Debug, Serialize)]
pub struct BatchRecord<'a> {
    /// Zero-based batch index
    pub batch: usize,

    #[serde(flatten)]
    pub summary: &'a BatchSummary,
}
