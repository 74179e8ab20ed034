mod config;
mod data;
mod mirror;
mod record;
mod sync;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::{Config, SyncConfig};
use data::{Calendar, FredClient};
use dotenv::dotenv;
use mirror::NotionClient;
use std::path::PathBuf;
use sync::{SyncReport, Synchronizer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "net-liquidity")]
#[command(about = "Sync the FRED net liquidity index to a CSV history and a Notion database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Local record file (overrides LIQUIDITY_CSV_PATH)
    #[arg(long, global = true)]
    csv: Option<PathBuf>,

    /// Skip mirroring dates that already exist in the Notion database
    #[arg(long, global = true)]
    check_remote: bool,

    /// Fetch and diff only; write nothing locally or remotely
    #[arg(long, global = true)]
    dry_run: bool,

    /// Run as if today were this date (YYYY-MM-DD)
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Command {
    /// Sync every aligned day in the lookback window
    Backfill {
        /// Days of history to request (overrides LIQUIDITY_LOOKBACK_DAYS)
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Alignment calendar (observed, daily)
        #[arg(long)]
        calendar: Option<Calendar>,
    },

    /// Record today's row from the latest released values
    Update,
}

/// Applies command-line flags on top of the environment configuration.
fn apply_overrides(cli: &Cli, sync: &mut SyncConfig) {
    if let Some(csv) = &cli.csv {
        sync.csv_path = csv.clone();
    }
    sync.check_remote_existing = cli.check_remote;
    sync.dry_run = cli.dry_run;
    if let Command::Backfill {
        lookback_days,
        calendar,
    } = &cli.command
    {
        if let Some(days) = lookback_days {
            sync.lookback_days = *days;
        }
        if let Some(calendar) = calendar {
            sync.calendar = *calendar;
        }
    }
}

/// Prints the outcome of one run.
fn print_report(report: &SyncReport, mode: &str, dry_run: bool) {
    if report.is_noop() {
        println!("Nothing new to {}; local record already up to date.", mode);
        return;
    }

    println!("\n{} Results:", mode);
    println!("Fetched Rows: {}", report.fetched);
    println!("New Rows: {}", report.new_rows);
    if dry_run {
        println!("Dry run: nothing written");
        return;
    }
    println!("Saved Locally: {}", report.persisted);
    println!("Mirrored: {}", report.mirrored);
    if report.skipped_remote > 0 {
        println!("Already Mirrored: {}", report.skipped_remote);
    }
}

/// Entry point for one synchronization run.
///
/// 1. Load environment variables and initialize logging
/// 2. Build configuration from the environment and command-line overrides
/// 3. Create the FRED and Notion clients
/// 4. Run a backfill or an update and print the report
///
/// # Returns
/// Returns `Ok(())` if the run completes, otherwise the first error; a
/// mirror error is returned after the local record has been saved
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    apply_overrides(&cli, &mut config.sync);

    let today = cli.as_of.unwrap_or_else(|| Local::now().date_naive());

    let provider = FredClient::new(
        config.fred.api_key.clone(),
        config.fred.base_url.clone(),
        config.request_timeout,
    )?;
    let mirror = NotionClient::new(
        config.notion.token.clone(),
        config.notion.database_id.clone(),
        config.notion.base_url.clone(),
        config.request_timeout,
    )?;

    info!(
        csv = %config.sync.csv_path.display(),
        dry_run = config.sync.dry_run,
        check_remote = config.sync.check_remote_existing,
        "configuration loaded"
    );

    let dry_run = config.sync.dry_run;
    let synchronizer = Synchronizer::new(config.sync, provider, mirror);

    match cli.command {
        Command::Backfill { .. } => {
            let report = synchronizer.backfill(today).await?;
            print_report(&report, "back-fill", dry_run);
        }
        Command::Update => {
            let report = synchronizer.update(today).await?;
            print_report(&report, "update", dry_run);
        }
    }

    Ok(())
}
