//! Observability and structured logging infrastructure.
//!
//! # Features
//!
//! - **Structured Logging**: Key-value pairs for machine-parseable logs
//! - **Span Tracking**: Scan, storage and network operations run inside
//!   `#[instrument]` spans that record their counters and durations
//! - **Multiple Formats**: Console (pretty/JSON) and rotating JSON file output
//! - **Environment Filtering**: `RUST_LOG` variable support
//!
//! # Usage
//!
//! ```no_run
//! use contract_log_indexer::observability;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Keep the guard alive for the whole run or buffered file logs are lost
//!     let _guard = observability::init_tracing(None, None, false)?;
//!     Ok(())
//! }
//! ```
//!
//! # Environment Configuration
//!
//! ```bash
//! # Component-specific levels
//! RUST_LOG=contract_log_indexer=debug,sqlx=warn contract-log-indexer --once
//!
//! # JSON console output plus a daily-rotated JSON file
//! LOG_JSON=true LOG_FILE=./logs/indexer.log contract-log-indexer --daemon
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{IndexerError, IndexerResult};

/// Filter used when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_FILTER: &str = "contract_log_indexer=info,warn";

/// Initialize the tracing subscriber.
///
/// * `log_level` - Filter override, used when `RUST_LOG` is unset
/// * `log_file` - Optional file path; enables daily-rotated JSON logs
/// * `json_output` - JSON console output instead of pretty output
///
/// Returns the file writer guard when file logging is enabled. Dropping it
/// flushes and stops the background writer, so hold it until shutdown.
///
/// # Errors
///
/// Returns [`IndexerError::ConfigError`] if the log directory cannot be
/// created or a global subscriber is already installed.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> IndexerResult<Option<WorkerGuard>> {
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .or(log_level)
        .map_or_else(|| EnvFilter::new(DEFAULT_FILTER), EnvFilter::new);

    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .boxed()
    };

    let (file_layer, guard) = match log_file.as_deref() {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(directory).map_err(|e| {
                IndexerError::config(
                    format!("Cannot create log directory {}", directory.display()),
                    Some(Box::new(e)),
                )
            })?;

            let file_appender = tracing_appender::rolling::daily(
                directory,
                path.file_name().unwrap_or_else(|| OsStr::new("indexer.log")),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| IndexerError::config("Failed to initialize tracing", Some(Box::new(e))))?;

    info!(
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized"
    );

    Ok(guard)
}

/// Initialize tracing for tests, writing through the test harness.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// Run with `cargo test -- --nocapture` to see the output.
pub fn init_test_tracing() {
    use tracing_subscriber::fmt::format::FmtSpan;

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("contract_log_indexer=debug"))
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_without_panicking() {
        init_test_tracing();
        // A subscriber is already installed, so this must error, not panic
        let result = init_tracing(Some("debug".to_string()), None, false);
        assert!(matches!(result, Err(IndexerError::ConfigError { .. })));
    }

    #[test]
    fn test_file_logging_creates_directory() {
        init_test_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/indexer.log");

        // Init fails (subscriber already set) but the directory is prepared first
        let _ = init_tracing(None, Some(path.clone()), true);
        assert!(path.parent().unwrap().is_dir());
    }
}
