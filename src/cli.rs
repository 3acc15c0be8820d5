//! Command-line interface for the contract log indexer.
//!
//! Exactly one run mode is selected per invocation:
//!
//! - `--once`: catch up from the checkpoint to the chain head, then exit
//! - `--daemon`: repeat the catch-up pass on an interval until Ctrl-C
//! - `--export <FILE>`: dump every stored log to a JSON file
//! - `--serve`: run the read-only HTTP query server
//!
//! # Example
//!
//! ```bash
//! contract-log-indexer --once
//! contract-log-indexer --export ./logs.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgGroup, Parser};
use colored::Colorize;
use tracing::info;

use crate::api::server::run_server;
use crate::app_state::AppState;
use crate::config::Config;
use crate::db::{create_pool, LogRepository};
use crate::decoder::EventDecoder;
use crate::error::{IndexerError, IndexerResult};
use crate::explorer::ExplorerClient;
use crate::export::{export_to_file, ExportDocument};
use crate::scanner::RangeScanner;
use crate::sync::{Indexer, SyncReport};

/// Contract Log Indexer
#[derive(Parser, Debug)]
#[command(name = "contract-log-indexer")]
#[command(about = "Mirrors a contract's event logs into SQLite and serves them over HTTP", long_about = None)]
#[command(version)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["once", "daemon", "export", "serve"]),
))]
struct Cli {
    /// Run one sync pass and exit
    #[arg(long)]
    once: bool,

    /// Poll for new blocks until interrupted
    #[arg(long)]
    daemon: bool,

    /// Write every stored log to FILE as JSON
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Serve the read-only query API
    #[arg(long)]
    serve: bool,
}

/// Selected run mode.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Once,
    Daemon,
    Export(PathBuf),
    Serve,
}

impl Cli {
    fn mode(self) -> Mode {
        if let Some(path) = self.export {
            Mode::Export(path)
        } else if self.daemon {
            Mode::Daemon
        } else if self.serve {
            Mode::Serve
        } else {
            Mode::Once
        }
    }
}

/// Parse CLI arguments and execute the selected mode.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is missing or invalid
/// - The database or ABI cannot be opened
/// - A one-shot pass, export or the query server fails
pub async fn run() -> IndexerResult<()> {
    let mode = Cli::parse().mode();
    let config = Config::from_env()?;

    let pool = create_pool(config.database_url()).await?;
    let repository = Arc::new(LogRepository::new(pool.clone()));

    let result = match mode {
        Mode::Once => run_once(&config, repository).await,
        Mode::Daemon => run_daemon(&config, repository).await,
        Mode::Export(path) => run_export(&config, &repository, &path).await,
        Mode::Serve => run_serve(&config, repository).await,
    };

    pool.close().await;
    result
}

fn build_indexer(
    config: &Config,
    repository: Arc<LogRepository>,
) -> IndexerResult<Indexer<ExplorerClient>> {
    let decoder = EventDecoder::from_abi_file(config.abi_path())?;
    info!(events = decoder.event_count(), abi = %config.abi_path().display(), "ABI loaded");

    let client = ExplorerClient::new(config.client_settings())?;
    let scanner = RangeScanner::new(
        Arc::new(client),
        Arc::new(decoder),
        Arc::clone(&repository),
        config.contract_address(),
        config.window_policy(),
    );

    Ok(Indexer::new(scanner, repository, config.sync_settings()))
}

async fn run_once(config: &Config, repository: Arc<LogRepository>) -> IndexerResult<()> {
    let indexer = build_indexer(config, repository)?;
    info!(contract = %config.contract_address(), "Starting one-shot sync");

    let report = indexer.sync_once().await?;
    print_sync_report(config.contract_address(), &report);
    Ok(())
}

async fn run_daemon(config: &Config, repository: Arc<LogRepository>) -> IndexerResult<()> {
    let indexer = build_indexer(config, repository)?;
    println!(
        "{} {} every {}s (Ctrl-C to stop)",
        "Indexing".cyan().bold(),
        config.contract_address(),
        config.sync_settings().poll_interval.as_secs()
    );

    let passes = indexer.run_daemon(shutdown_signal()).await;

    println!("{} after {passes} passes", "Stopped".yellow().bold());
    Ok(())
}

async fn run_export(config: &Config, repository: &LogRepository, path: &Path) -> IndexerResult<()> {
    let document = export_to_file(repository, path, config.contract_address()).await?;
    print_export_summary(path, &document);
    Ok(())
}

async fn run_serve(config: &Config, repository: Arc<LogRepository>) -> IndexerResult<()> {
    let state = AppState::new(repository, config.query_settings());
    run_server(state, config.server_settings(), shutdown_signal())
        .await
        .map_err(IndexerError::from)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler the process is stopped externally.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_sync_report(contract_address: &str, report: &SyncReport) {
    println!();
    println!("{}", "═══════════════════════════════════════".cyan());
    println!("{}", "  Sync complete".green().bold());
    println!("{}", "═══════════════════════════════════════".cyan());
    println!("  {} {}", "Contract:".bold(), contract_address);

    if report.up_to_date() {
        println!(
            "  {} checkpoint {} is past head {}",
            "Up to date:".bold(),
            report.checkpoint,
            report.head_block
        );
    } else {
        println!(
            "  {} {} → {}",
            "Blocks:".bold(),
            report.from_block,
            report.head_block
        );
        println!(
            "  {} {} new / {} fetched",
            "Logs:".bold(),
            report.scan.inserted.to_string().green(),
            report.scan.fetched
        );
        if report.scan.undecoded > 0 {
            println!(
                "  {} {}",
                "Undecoded:".bold(),
                report.scan.undecoded.to_string().yellow()
            );
        }
        println!(
            "  {} {} ({} failed)",
            "Requests:".bold(),
            report.scan.requests,
            report.scan.failures
        );
    }

    println!("  {} {}", "Checkpoint:".bold(), report.checkpoint);
    println!();
}

fn print_export_summary(path: &Path, document: &ExportDocument) {
    println!(
        "{} {} logs to {}",
        "Exported".green().bold(),
        document.count,
        path.display()
    );
    match document.last_synced_block {
        Some(block) => println!("  {} {}", "Checkpoint:".bold(), block),
        None => println!("  {} {}", "Checkpoint:".bold(), "never synced".yellow()),
    }
}
