// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ridesync command line
//!
//! Runs one incremental sync from iGPSport to the configured destinations
//! and prints the report as JSON on stdout.

use anyhow::Context;
use clap::Parser;
use ridesync::{
    adapters::{self, http},
    config::{SyncConfig, SyncMode},
    SyncRun, SyncStatus,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ridesync", version, about = "Incremental activity sync")]
struct Cli {
    /// Report what would be transferred without downloading or uploading
    #[arg(long)]
    dry_run: bool,

    /// Override STORAGE_DIR
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty_logs: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.pretty_logs);

    match run(cli).await {
        Ok(status) => match status {
            SyncStatus::Failed => ExitCode::from(2),
            SyncStatus::Partial => ExitCode::from(1),
            _ => ExitCode::SUCCESS,
        },
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Sync aborted");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<SyncStatus> {
    let mut config = SyncConfig::from_env().context("Failed to load configuration")?;
    if cli.dry_run {
        config.mode = SyncMode::DryRun;
    }
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir;
    }
    tracing::info!(
        mode = ?config.mode,
        storage_dir = %config.storage_dir.display(),
        destinations = config.destinations.len(),
        "Starting ridesync"
    );

    let client = http::build_client(config.transfer.operation_timeout)
        .context("Failed to build HTTP client")?;

    let source = adapters::for_platform(
        config.source.platform,
        &client,
        config.archive_dir.clone(),
    );
    let destinations = config
        .destinations
        .iter()
        .map(|d| adapters::for_platform(d.platform, &client, config.archive_dir.clone()))
        .collect();

    let mut sync = SyncRun::new(config, source, destinations).context("Invalid sync setup")?;
    let report = sync.run().await;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(report.status)
}

/// Initialize structured logging on stderr (JSON by default).
fn init_logging(pretty: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("ridesync=debug".parse().unwrap())
        .add_directive("info".parse().unwrap());

    let registry = tracing_subscriber::registry().with(filter);

    if pretty {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
