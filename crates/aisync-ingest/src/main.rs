//! aisync-ingest - NOAA AIS archive ingestion

use aisync_common::logging::{init_logging, LogConfig, LogLevel};
use aisync_ingest::{
    cli::{Cli, Commands, RunArgs},
    config::IngestConfig,
    driver::RunDriver,
    ledger::{FileLedger, Ledger},
    publisher::Publisher,
    storage::{LocalStore, Storage, StorageConfig},
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("aisync-ingest")
        .filter_directives("aws_config=warn,aws_smithy_runtime=warn,hyper_util=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.merge_env().unwrap_or_else(|e| {
        eprintln!("Ignoring invalid logging environment: {}", e);
        LogConfig::builder().level(log_level).build()
    });

    let log_guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        },
    };

    let code = match execute_command(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            1
        },
    };

    // process::exit skips destructors, so flush file logs first
    drop(log_guard);
    process::exit(code);
}

/// Run the selected command, returning the process exit code
async fn execute_command(cli: Cli) -> Result<i32> {
    let mut config = IngestConfig::from_env().context("Invalid ingestion configuration")?;
    if let Some(ledger) = cli.ledger {
        config.ledger_path = ledger;
    }

    match cli.command {
        Commands::Run(args) => run(args, config).await,
        Commands::Status { id } => status(&config.ledger_path, id.as_deref()).await,
    }
}

async fn run(args: RunArgs, config: IngestConfig) -> Result<i32> {
    let config = args.apply(config);
    config.validate()?;

    let ledger: Arc<dyn Ledger> = Arc::new(FileLedger::new(&config.ledger_path));
    let publisher = build_publisher(args.local_store.clone()).await?;

    info!(
        target_store = %publisher.describe(),
        ledger = %config.ledger_path.display(),
        concurrency = config.concurrency,
        "Starting ingestion"
    );

    let driver = RunDriver::new(config, ledger, publisher)?;
    let summary = driver
        .run(args.year_start, args.year_end, args.resume_from.as_deref())
        .await?;

    if let Some(path) = &args.summary {
        let json = serde_json::to_string_pretty(&summary)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!("Wrote run summary to {}", path.display());
    }

    let totals = &summary.totals;
    println!(
        "Processed {} years: {} recorded, {} skipped, {} failed, {} listing errors",
        summary.years.len(),
        totals.recorded,
        totals.skipped,
        totals.failed,
        totals.listing_errors
    );

    if args.strict && summary.has_failures() {
        return Ok(2);
    }

    Ok(0)
}

async fn build_publisher(local_store: Option<PathBuf>) -> Result<Arc<dyn Publisher>> {
    match local_store {
        Some(root) => Ok(Arc::new(LocalStore::new(root))),
        None => {
            let storage_config = StorageConfig::from_env()
                .context("Object storage is not configured (set S3_BUCKET or use --local-store)")?;
            Ok(Arc::new(Storage::new(storage_config).await?))
        },
    }
}

async fn status(ledger_path: &std::path::Path, id: Option<&str>) -> Result<i32> {
    let ledger = FileLedger::new(ledger_path);
    let entries = ledger.entries().await?;

    println!("Ledger: {}", ledger_path.display());
    println!("Recorded archives: {}", entries.len());

    if let Some(last) = entries.last() {
        println!("Last recorded: {}", last);
    }

    if let Some(id) = id {
        let recorded = ledger.contains(id).await?;
        println!("{}: {}", id, if recorded { "recorded" } else { "not recorded" });
        if !recorded {
            return Ok(1);
        }
    }

    Ok(0)
}
