//! The `prism process` command.

mod batch;
mod input;
mod setup;
pub mod types;

pub use types::OutputFormat;

use clap::Args;
use prism_core::Pipeline;
use std::path::PathBuf;

use batch::run_batches;
use input::collect_urls;
use setup::setup_pipeline;

/// Arguments for the `process` command.
#[derive(Args, Debug, Default)]
pub struct ProcessArgs {
    /// Image URLs to process (local paths are accepted too)
    pub urls: Vec<String>,

    /// File with one URL per line (`-` reads stdin; `#` starts a comment)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output file for batch records (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Record format (defaults to `output.format` from the config)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Number of URLs per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Worker pool size
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Comma-separated filters to apply (see `prism filters`)
    #[arg(long, value_delimiter = ',')]
    pub filters: Vec<String>,

    /// Root directory for filtered outputs
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Everything needed to run batches, assembled by setup_pipeline().
pub(crate) struct ProcessContext {
    pub pipeline: Pipeline,
    pub format: OutputFormat,
    pub batch_size: usize,
    pub pretty: bool,
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs) -> anyhow::Result<()> {
    if args.urls.is_empty() && args.input.is_none() {
        anyhow::bail!(
            "No input given.\n\n  Hint: pass URLs as arguments or use --input <FILE> (one URL per line)."
        );
    }

    let urls = collect_urls(&args.urls, args.input.as_deref())?;
    if urls.is_empty() {
        tracing::warn!("No valid URLs to process");
        return Ok(());
    }

    let ctx = setup_pipeline(&args)?;
    tracing::info!(
        "Processing {} URL(s) in batches of {}",
        urls.len(),
        ctx.batch_size
    );
    run_batches(ctx, &args, &urls).await
}
