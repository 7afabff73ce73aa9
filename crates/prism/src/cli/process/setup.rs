//! Pipeline setup: config overrides, worker pool, and output format.

use prism_core::{Config, Pipeline, WorkerPool};

use super::types::OutputFormat;
use super::{ProcessArgs, ProcessContext};

/// Load config, apply CLI overrides, and assemble the pipeline.
pub fn setup_pipeline(args: &ProcessArgs) -> anyhow::Result<ProcessContext> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, args);
    config.validate()?;

    let format = resolve_format(args, &config);
    let pool = WorkerPool::current(config.pool.workers)?;
    let pipeline = Pipeline::from_config(&config, pool)?;

    tracing::info!(
        "Filters: {} | workers: {} | batch size: {} | output: {}",
        pipeline.filter_names().join(", "),
        config.pool.workers,
        config.batch.size,
        config.output_dir().display()
    );

    Ok(ProcessContext {
        pipeline,
        format,
        batch_size: config.batch.size,
        pretty: config.output.pretty,
    })
}

/// Apply command-line overrides on top of the loaded config.
pub(crate) fn apply_overrides(config: &mut Config, args: &ProcessArgs) {
    if let Some(workers) = args.parallel {
        config.pool.workers = workers;
    }
    if let Some(size) = args.batch_size {
        config.batch.size = size;
    }
    if !args.filters.is_empty() {
        config.filters.enabled = args.filters.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.general.output_dir = dir.clone();
    }
}

/// `--format` wins; otherwise the config's `output.format` (already validated).
fn resolve_format(args: &ProcessArgs, config: &Config) -> OutputFormat {
    args.format.unwrap_or_else(|| {
        match prism_core::OutputFormat::parse(&config.output.format) {
            Some(prism_core::OutputFormat::Json) => OutputFormat::Json,
            _ => OutputFormat::Jsonl,
        }
    })
}
