//! CLI entry point for the transit speed sampler.
//!
//! `collect` samples on a fixed interval for a number of days, `serve` runs
//! one cycle per authorized HTTP trigger, `once` runs a single cycle from the
//! shell and `inspect` dumps a stored record partition.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_speed_sampler::{
    clock::{Clock, SystemClock},
    codec,
    collector::{Collector, TriggerMode},
    config::Config,
    feed::{FeedClient, NextBusClient},
    fetch::BasicClient,
    store::{BlobStore, Granularity, LocalBlobStore, PartitionedStore, S3BlobStore},
    trigger::{self, TriggerAuth, TriggerState},
};

#[derive(Parser)]
#[command(name = "transit_speed_sampler")]
#[command(about = "Samples transit vehicle speeds and stores per-route averages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample every minute for a number of days (Ctrl+C stops early)
    Collect {
        /// Number of days to keep sampling
        #[arg(value_name = "DAYS", default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,
    },
    /// Run one cycle per authorized request to the trigger endpoint
    Serve,
    /// Run a single cycle and print its report
    Once,
    /// Print the records in a local partition file as JSON lines
    Inspect {
        /// Path to a `.bin` record partition
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Usage errors exit here, before any network or storage access
    let cli = Cli::parse();

    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/transit_speed_sampler.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_speed_sampler.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    match cli.command {
        Commands::Collect { days } => {
            let config = Config::from_env()?;
            run(&config, TriggerMode::bounded_days(days)).await?;
        }
        Commands::Serve => {
            let config = Config::from_env()?;
            run(&config, TriggerMode::SingleShot).await?;
        }
        Commands::Once => {
            let config = Config::from_env()?;
            let collector = build_collector(&config, TriggerMode::SingleShot.granularity()).await?;
            let report = collector.run_cycle().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.success {
                anyhow::bail!("cycle failed: {}", report.error.unwrap_or_default());
            }
        }
        Commands::Inspect { file } => {
            inspect(&file)?;
        }
    }

    Ok(())
}

/// Runs the collector in the given trigger mode.
async fn run(config: &Config, mode: TriggerMode) -> Result<()> {
    let collector = Arc::new(build_collector(config, mode.granularity()).await?);

    match mode {
        TriggerMode::Bounded { interval, budget } => {
            info!(
                budget_days = budget.as_secs() / 86_400,
                interval_secs = interval.as_secs(),
                "Sampling. Press Ctrl+C to stop."
            );
            collector.run_bounded(interval, budget, shutdown_signal()).await;
        }
        TriggerMode::SingleShot => {
            let auth = TriggerAuth::new(
                config.current_signing_key.clone(),
                config.next_signing_key.clone(),
                config.bearer_token.clone(),
            );
            let state = TriggerState { collector, auth };
            trigger::serve(&config.listen_address, config.trigger_path.clone(), state).await?;
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested, stopping after the current cycle"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

async fn build_collector(config: &Config, granularity: Granularity) -> Result<Collector> {
    let http = BasicClient::new(config.http_timeout, config.http_connect_timeout)
        .context("Failed to build HTTP client")?;
    let feed: Arc<dyn FeedClient> = Arc::new(NextBusClient::new(
        http,
        &config.vehicles_url,
        &config.routes_url,
    ));

    let backend: Arc<dyn BlobStore> = match &config.s3_bucket {
        Some(bucket) => {
            info!(bucket = %bucket, prefix = %config.s3_key_prefix, "Using S3 storage");
            Arc::new(S3BlobStore::from_env(bucket, &config.s3_key_prefix).await)
        }
        None => {
            info!(data_dir = %config.data_dir, "Using local storage");
            Arc::new(LocalBlobStore::new(&config.data_dir))
        }
    };

    let store = PartitionedStore::new(backend, granularity)
        .with_prefixes(&config.record_prefix, &config.routes_prefix);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    Ok(Collector::new(feed, clock, store))
}

/// Prints each record of a local partition as a JSON line.
fn inspect(file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let records = codec::decode(&bytes).with_context(|| format!("{} is not a valid partition", file.display()))?;

    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    info!(records = records.len(), file = %file.display(), "Partition decoded");

    Ok(())
}
