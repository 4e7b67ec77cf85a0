//! Operator commands against the event ledger.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use arena_core::{Address, BatchReport, Wei};
use arena_infra::batch::{BackoffRetrier, BatchConfig};
use arena_infra::ledger::{self, LedgerClient};
use arena_infra::operations::LedgerOperations;
use arena_infra::snapshot::{ScoreSnapshotJob, SnapshotStore};

#[derive(Parser)]
#[command(author, version, about = "Operator tooling for the event ledger")]
struct Cli {
    /// Command prefix of the ledger task runner; unset uses an in-memory ledger.
    #[arg(long, env = "LEDGER_COMMAND")]
    ledger_command: Option<String>,
    /// Items per chunk.
    #[arg(long, env = "BATCH_AMT", default_value_t = 50)]
    chunk_size: usize,
    /// Pause between chunks, in milliseconds.
    #[arg(long, env = "SLEEP_MS", default_value_t = 5_000)]
    sleep_ms: u64,
    #[arg(long, env = "RETRY_INTERVAL_MS", default_value_t = 3_000)]
    retry_interval_ms: u64,
    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = 10)]
    retry_attempts: u32,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register addresses one write each, skipping invalid and known ones
    Register {
        /// Comma-separated addresses
        #[arg(long)]
        address: String,
    },
    /// Register addresses with one retried write per batch
    RegisterBatch {
        #[arg(long)]
        addresses: String,
        #[arg(long, default_value_t = 50)]
        batch_size: usize,
    },
    /// Send a fixed amount of native currency to each address
    Drip {
        #[arg(long)]
        addresses: String,
        /// Amount per recipient in whole coins, e.g. 0.3
        #[arg(long, value_parser = parse_amount)]
        value: Wei,
        /// Validate transfers without executing them
        #[arg(long)]
        dry: bool,
    },
    /// Check whether an address is registered
    Exists {
        #[arg(long)]
        address: String,
    },
    /// Refresh standings once and write the snapshot file
    Snapshot {
        #[arg(long, env = "LEADERBOARD_PATH", default_value = "data/leaderboard.json")]
        path: PathBuf,
    },
}

fn parse_amount(raw: &str) -> Result<Wei, String> {
    Wei::parse_ether(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    arena_observability::init_pretty();

    let cli = Cli::parse();
    if cli.chunk_size == 0 {
        bail!("--chunk-size must be greater than zero");
    }

    let ledger = ledger::connect(cli.ledger_command.as_deref());
    let operations = LedgerOperations::new(
        ledger.clone(),
        BatchConfig::new(cli.chunk_size, Duration::from_millis(cli.sleep_ms)),
        BackoffRetrier::new(Duration::from_millis(cli.retry_interval_ms), cli.retry_attempts),
    );

    match cli.cmd {
        Command::Register { address } => {
            let report = operations.register_addresses(&address).await;
            if !report.invalid.is_empty() {
                warn!(entries = ?report.invalid, "invalid addresses were skipped");
            }
            if !report.already_registered.is_empty() {
                info!(count = report.already_registered.len(), "addresses already registered");
            }
            print_json(&report)?;
            finish(&report.batch)
        }
        Command::RegisterBatch {
            addresses,
            batch_size,
        } => {
            if batch_size == 0 {
                bail!("--batch-size must be greater than zero");
            }
            let report = operations.register_in_batches(&addresses, batch_size).await?;
            print_json(&report)?;
            finish(&report)
        }
        Command::Drip {
            addresses,
            value,
            dry,
        } => {
            let report = operations.distribute_funds(&addresses, value, dry).await?;
            print_json(&report)?;
            finish(&report)
        }
        Command::Exists { address } => {
            let address = Address::parse(&address)?;
            let known = ledger
                .is_registered(&address)
                .await
                .with_context(|| format!("membership check for {address} failed"))?;
            info!(address = %address, registered = known, "membership checked");
            println!("{known}");
            Ok(())
        }
        Command::Snapshot { path } => snapshot_once(ledger, path).await,
    }
}

async fn snapshot_once(ledger: Arc<dyn LedgerClient>, path: PathBuf) -> anyhow::Result<()> {
    let job = ScoreSnapshotJob::new(ledger, SnapshotStore::new(path), ScoreSnapshotJob::DEFAULT_INTERVAL);
    let summary = job.run().await.context("snapshot failed")?;
    println!(
        "wrote {} entries to {} ({} records rejected)",
        summary.entries,
        job.store().path().display(),
        summary.rejected
    );
    Ok(())
}

fn print_json<T: Serialize>(report: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn finish(report: &BatchReport) -> anyhow::Result<()> {
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        chunks = report.chunks,
        "operation finished"
    );
    if !report.failed.is_empty() {
        bail!("{} of {} writes failed: {}", report.failed.len(), report.total(), report.failed.join(", "));
    }
    Ok(())
}
