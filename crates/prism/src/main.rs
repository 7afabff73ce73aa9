//! Prism CLI - concurrent image download and filter pipeline.
//!
//! Prism reads image URLs, skips the ones whose outputs already exist,
//! downloads the rest, and stores one filtered variant per configured filter.
//! A JSON record is emitted for every batch.
//!
//! # Usage
//!
//! ```bash
//! # Process a couple of URLs with the default filters
//! prism process https://example.com/a.jpg https://example.com/b.png
//!
//! # Process a URL list in batches of 32, writing records to a file
//! prism process --input urls.txt --batch-size 32 --output runs.jsonl
//!
//! # Pick filters and an output directory
//! prism process --input urls.txt --filters thumbnail,grayscale --output-dir ./out
//!
//! # View configuration
//! prism config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Prism - concurrent image download and filter pipeline.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Download images and apply the configured filters
    Process(cli::process::ProcessArgs),

    /// List available filters
    Filters,

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match prism_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `prism config path`."
            );
            prism_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Prism v{}", prism_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args).await,
        Commands::Filters => cli::filters::execute(&config),
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
