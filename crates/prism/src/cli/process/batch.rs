//! Batch loop: split URLs into batches, stream one record per batch, and show progress.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};

use prism_core::{BatchSummary, OutputWriter, Url};

use super::types::BatchRecord;
use super::{ProcessArgs, ProcessContext};

/// Running totals across every batch in a run.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct RunTotals {
    pub batches: usize,
    pub urls: usize,
    pub cached: usize,
    pub outputs: usize,
    pub failures: usize,
    pub failed_urls: usize,
    pub bytes_written: u64,
}

impl RunTotals {
    /// Fold one batch summary into the totals.
    pub fn add(&mut self, summary: &BatchSummary) {
        self.batches += 1;
        self.urls += summary.input_count;
        self.cached += summary.cached_count;
        self.outputs += summary.processed_count;
        self.failures += summary.failures.len();
        self.failed_urls += summary
            .failures
            .iter()
            .filter(|f| f.filter.is_none())
            .count();
        self.bytes_written += summary.outputs.iter().map(|o| o.bytes_written).sum::<u64>();
    }
}

/// Run every batch in order, writing a record after each one completes.
pub async fn run_batches(
    ctx: ProcessContext,
    args: &ProcessArgs,
    urls: &[Url],
) -> anyhow::Result<()> {
    let sink: Box<dyn Write + Send> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    let mut writer = OutputWriter::new(sink, ctx.format.into(), ctx.pretty);

    let progress = create_progress_bar(urls.len() as u64);
    let start_time = Instant::now();
    let mut totals = RunTotals::default();

    for (index, batch) in urls.chunks(ctx.batch_size.max(1)).enumerate() {
        let summary = match ctx.pipeline.process_batch(batch).await {
            Ok(summary) => summary,
            Err(e) => {
                progress.abandon();
                // Keep the records already written well-formed.
                if let Err(finish_error) = writer.finish() {
                    tracing::warn!("Failed to finish output: {finish_error}");
                }
                return Err(e.into());
            }
        };
        totals.add(&summary);

        progress.suspend(|| {
            writer.push(&BatchRecord {
                batch: index,
                summary: &summary,
            })
        })?;

        progress.inc(batch.len() as u64);
        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            progress.set_message(format!(
                "{:.1} img/sec, {} failed",
                totals.urls as f64 / elapsed,
                totals.failures
            ));
        }
    }

    writer.finish()?;
    progress.finish_and_clear();
    if let Some(path) = &args.output {
        tracing::info!("Output written to {:?}", path);
    }

    print_summary(&totals, start_time.elapsed());
    if totals.failures > 0 {
        tracing::warn!(
            "{} failure(s); see the `failures` field of each record",
            totals.failures
        );
    }
    Ok(())
}

/// Create a progress bar counting URLs.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table to stderr.
fn print_summary(totals: &RunTotals, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        totals.urls as f64 / secs
    } else {
        0.0
    };
    let mb_written = totals.bytes_written as f64 / 1_000_000.0;

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    URLs:         {:>8}", totals.urls);
    eprintln!("    Batches:      {:>8}", totals.batches);
    eprintln!("    Outputs:      {:>8}", totals.outputs);
    if totals.cached > 0 {
        eprintln!("    Cached:       {:>8}", totals.cached);
    }
    if totals.failures > 0 {
        eprintln!("    Failures:     {:>8}", totals.failures);
        eprintln!("      fetch:      {:>8}", totals.failed_urls);
        eprintln!("      filter:     {:>8}", totals.failures - totals.failed_urls);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Duration:     {:>7.1}s", secs);
    eprintln!("    Rate:         {:>7.1} url/sec", rate);
    eprintln!("    Written:      {:>7.1} MB", mb_written);
    eprintln!("  ====================================");
}
