//! CLI entry point for the contract log indexer.
//!
//! ```text
//! main.rs (runtime + tracing)
//!     ↓
//! cli::run()
//!     ↓
//! config → db → decoder → explorer → scanner → sync / export / api
//! ```

use contract_log_indexer::{cli, observability};
use tracing::error;

#[tokio::main]
async fn main() {
    // RUST_LOG, LOG_JSON and LOG_FILE control logging, e.g.
    //   RUST_LOG=contract_log_indexer=debug,sqlx=warn contract-log-indexer --once
    //   LOG_JSON=true LOG_FILE=./logs/indexer.log contract-log-indexer --daemon
    let log_level = std::env::var("RUST_LOG").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    // Dropping the guard flushes the file appender.
    let guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e}");
        // exit() skips destructors; flush the file appender first
        drop(guard);
        std::process::exit(1);
    }
}
