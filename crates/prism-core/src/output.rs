//! Streaming JSON / JSON Lines output for batch records.
//!
//! Records are written as soon as they are pushed, so a long run produces
//! output batch by batch. In JSON mode the records form a single array that is
//! closed by [`OutputWriter::finish`].

use serde::Serialize;
use std::io::{self, Write};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON array holding every record
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Serializes records incrementally to any writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    records: usize,
}

impl<W: Write> OutputWriter<W> {
    /// Create a writer. `pretty` only affects [`OutputFormat::Json`].
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            records: 0,
        }
    }

    /// Append one record and flush it through.
    pub fn push<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        match self.format {
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, record).map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
            OutputFormat::Json => {
                let separator = if self.records == 0 { "[" } else { "," };
                self.writer.write_all(separator.as_bytes())?;
                if self.pretty {
                    writeln!(self.writer)?;
                    serde_json::to_writer_pretty(&mut self.writer, record)
                        .map_err(io::Error::other)?;
                } else {
                    serde_json::to_writer(&mut self.writer, record).map_err(io::Error::other)?;
                }
            }
        }
        self.records += 1;
        self.writer.flush()
    }

    /// Number of records pushed so far.
    pub fn records_written(&self) -> usize {
        self.records
    }

    /// Close any open array, flush, and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.format == OutputFormat::Json {
            if self.records == 0 {
                self.writer.write_all(b"[")?;
            } else if self.pretty {
                writeln!(self.writer)?;
            }
            writeln!(self.writer, "]")?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}
