// Idlewatch - Main Entry Point
//
// Scheduled reporting job: pulls the active worker roster from the record
// store, cross-references idle-time statistics from the time-tracking API
// and posts alerts to the chat API. Every outbound call goes through the
// per-service throttle core.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use idlewatch::config::Config;
use idlewatch::report;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Idlewatch: rate-limited workforce idle-time reporting
#[derive(Parser, Debug)]
#[command(name = "idlewatch")]
#[command(author = "Idlewatch Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Workforce idle-time reporting with per-service rate limiting", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a configuration file (defaults to the XDG config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one reporting pass
    Run,
    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(filter.into())
                .from_env_lossy(),
        )
        .init();

    info!("Idlewatch v0.1.0 starting...");

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    if config.metrics.enabled {
        if let Err(e) = idlewatch::metrics::init() {
            error!("Failed to initialize metrics: {}", e);
        }
    }

    match args.command {
        Some(Commands::CheckConfig) => {
            // Config::load* already validated; reaching here means it passed.
            info!("Configuration is valid");
            Ok(())
        }
        Some(Commands::Run) | None => {
            let started = std::time::Instant::now();
            let summary = report::run_pass(&config).await?;

            info!(
                workers = summary.workers_processed,
                flagged = summary.flagged.len(),
                failures = summary.call_failures,
                alerts = summary.alerts_posted,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Pass complete"
            );

            if config.metrics.enabled {
                match idlewatch::metrics::gather_metrics() {
                    Ok(text) => tracing::debug!("Metrics:\n{}", text),
                    Err(e) => error!("Failed to gather metrics: {}", e),
                }
            }

            Ok(())
        }
    }
}
