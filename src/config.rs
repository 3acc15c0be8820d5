//! Configuration management for the contract log indexer.
//!
//! This module loads and validates configuration from environment variables
//! using the `dotenvy` crate. All operations return [`IndexerResult`].
//!
//! ## Environment Variables
//!
//! Required:
//! - `CONTRACT_ADDRESS`: Contract whose logs are mirrored
//! - `EXPLORER_API_KEY`: API key for the block-explorer log API
//! - `ABI_PATH`: JSON ABI (bare array or build artifact with an `abi` field)
//!
//! Optional (with defaults):
//! - `EXPLORER_API_URLS`: Comma-separated gateway URLs (default: `https://api.etherscan.io/v2/api`)
//! - `CHAIN_ID`: Chain selector for multi-chain gateways (default: 1)
//! - `DATABASE_URL`: SQLite database (default: `sqlite:./indexer.db`)
//! - `START_BLOCK`: Checkpoint seeded on first run (default: 0)
//! - `OVERLAP_BLOCKS`: Blocks re-scanned below the checkpoint each pass (default: 50)
//! - `OUTER_WINDOW_BLOCKS`: Blocks per checkpointed window (default: 50000)
//! - `POLL_INTERVAL_SECS`: Daemon polling interval (default: 30)
//! - `MAX_WINDOW_BLOCKS` / `MIN_WINDOW_BLOCKS`: Request window bounds (default: 2000 / 10)
//! - `WINDOW_GROWTH_PERCENT`: Growth after a successful request (default: 135)
//! - `FAILURE_BACKOFF_MS` / `MIN_WINDOW_BACKOFF_MS`: Scanner backoff (default: 1000 / 5000)
//! - `RESULT_CAP`: Upstream page size treated as truncation (default: 1000)
//! - `MAX_RETRIES`: Attempts per upstream call (default: 5)
//! - `RETRY_BASE_DELAY_MS` / `RETRY_MAX_DELAY_MS`: Retry backoff (default: 500 / 30000)
//! - `REQUEST_DELAY_MS` / `REQUEST_JITTER_MS`: Pacing before each request (default: 250 / 150)
//! - `REQUEST_TIMEOUT_SECS`: HTTP timeout (default: 30)
//! - `API_PORT`: Query server port (default: 3000)
//! - `CACHE_TTL_SECS`: Query cache lifetime (default: 10)
//! - `FEATURED_EVENT`: Event served by `/events/featured` (default: `Deposit`)
//! - `QUERY_LIMIT_CAP`: Maximum rows per query (default: 500)
//! - `API_RATE_LIMIT_RPM`: Requests per minute per server (default: 600)
//! - `API_CORS_ORIGINS`: Comma-separated origins or `*` (default: `*`)
//! - `RUST_LOG`, `LOG_JSON`, `LOG_FILE`: Logging, read by the binary
//!
//! ## Example
//!
//! ```no_run
//! use contract_log_indexer::config::Config;
//! use contract_log_indexer::error::IndexerResult;
//!
//! # fn main() -> IndexerResult<()> {
//! let config = Config::from_env()?;
//! println!("Indexing {}", config.contract_address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

use crate::api::server::ServerSettings;
use crate::app_state::QuerySettings;
use crate::error::{IndexerError, IndexerResult};
use crate::explorer::{ClientSettings, RequestPacing, RetryPolicy};
use crate::scanner::WindowPolicy;
use crate::sync::SyncSettings;

const DEFAULT_EXPLORER_URL: &str = "https://api.etherscan.io/v2/api";

/// Main configuration struct for the indexer.
#[derive(Debug, Clone)]
pub struct Config {
    contract_address: String,
    explorer_api_key: String,
    abi_path: PathBuf,
    explorer_api_urls: Vec<String>,
    chain_id: u64,
    database_url: String,

    start_block: u64,
    overlap_blocks: u64,
    outer_window_blocks: u64,
    poll_interval_secs: u64,

    max_window_blocks: u64,
    min_window_blocks: u64,
    window_growth_percent: u64,
    failure_backoff_ms: u64,
    min_window_backoff_ms: u64,
    result_cap: usize,

    max_retries: u32,
    retry_base_delay_ms: u64,
    retry_max_delay_ms: u64,
    request_delay_ms: u64,
    request_jitter_ms: u64,
    request_timeout_secs: u64,

    api_port: u16,
    cache_ttl_secs: u64,
    featured_event: String,
    query_limit_cap: u32,
    api_rate_limit_rpm: NonZeroU32,
    api_cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Loads `.env` through `dotenvy` first when one is present.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::ConfigError`] if a required variable is
    /// missing, a value does not parse, or the window settings are
    /// inconsistent.
    pub fn from_env() -> IndexerResult<Self> {
        // A missing .env file is fine
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> IndexerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let raw_address = vars.required("CONTRACT_ADDRESS")?;
        let contract_address = Address::from_str(raw_address.trim())
            .map_err(|e| {
                IndexerError::config(
                    format!("CONTRACT_ADDRESS must be a valid Ethereum address, got: {raw_address}"),
                    Some(Box::new(e)),
                )
            })?
            .to_checksum(None);

        let explorer_api_key = vars.required("EXPLORER_API_KEY")?;
        if explorer_api_key.starts_with("your_") {
            return Err(IndexerError::config(
                "EXPLORER_API_KEY must be set to a real API key",
                None,
            ));
        }

        let abi_path = PathBuf::from(vars.required("ABI_PATH")?);

        let explorer_api_urls = split_list(&vars.string("EXPLORER_API_URLS", DEFAULT_EXPLORER_URL));
        if explorer_api_urls.is_empty() {
            return Err(IndexerError::config(
                "EXPLORER_API_URLS must list at least one URL",
                None,
            ));
        }

        let api_rate_limit_rpm = NonZeroU32::new(vars.parse("API_RATE_LIMIT_RPM", 600)?)
            .ok_or_else(|| {
                IndexerError::config("API_RATE_LIMIT_RPM must be greater than 0", None)
            })?;

        let config = Self {
            contract_address,
            explorer_api_key,
            abi_path,
            explorer_api_urls,
            chain_id: vars.parse("CHAIN_ID", 1)?,
            database_url: vars.string("DATABASE_URL", "sqlite:./indexer.db"),

            start_block: vars.parse("START_BLOCK", 0)?,
            overlap_blocks: vars.parse("OVERLAP_BLOCKS", 50)?,
            outer_window_blocks: vars.parse("OUTER_WINDOW_BLOCKS", 50_000)?,
            poll_interval_secs: vars.parse("POLL_INTERVAL_SECS", 30)?,

            max_window_blocks: vars.parse("MAX_WINDOW_BLOCKS", 2_000)?,
            min_window_blocks: vars.parse("MIN_WINDOW_BLOCKS", 10)?,
            window_growth_percent: vars.parse("WINDOW_GROWTH_PERCENT", 135)?,
            failure_backoff_ms: vars.parse("FAILURE_BACKOFF_MS", 1_000)?,
            min_window_backoff_ms: vars.parse("MIN_WINDOW_BACKOFF_MS", 5_000)?,
            result_cap: vars.parse("RESULT_CAP", 1_000)?,

            max_retries: vars.parse("MAX_RETRIES", 5)?,
            retry_base_delay_ms: vars.parse("RETRY_BASE_DELAY_MS", 500)?,
            retry_max_delay_ms: vars.parse("RETRY_MAX_DELAY_MS", 30_000)?,
            request_delay_ms: vars.parse("REQUEST_DELAY_MS", 250)?,
            request_jitter_ms: vars.parse("REQUEST_JITTER_MS", 150)?,
            request_timeout_secs: vars.parse("REQUEST_TIMEOUT_SECS", 30)?,

            api_port: vars.parse("API_PORT", 3_000)?,
            cache_ttl_secs: vars.parse("CACHE_TTL_SECS", 10)?,
            featured_event: vars.string("FEATURED_EVENT", "Deposit"),
            query_limit_cap: vars.parse("QUERY_LIMIT_CAP", 500)?,
            api_rate_limit_rpm,
            api_cors_origins: split_list(&vars.string("API_CORS_ORIGINS", "*")),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> IndexerResult<()> {
        if self.min_window_blocks == 0 {
            return Err(IndexerError::config("MIN_WINDOW_BLOCKS must be at least 1", None));
        }
        if self.min_window_blocks > self.max_window_blocks {
            return Err(IndexerError::config(
                format!(
                    "MIN_WINDOW_BLOCKS ({}) must not exceed MAX_WINDOW_BLOCKS ({})",
                    self.min_window_blocks, self.max_window_blocks
                ),
                None,
            ));
        }
        if self.window_growth_percent <= 100 {
            return Err(IndexerError::config(
                "WINDOW_GROWTH_PERCENT must be greater than 100",
                None,
            ));
        }
        if self.outer_window_blocks == 0 {
            return Err(IndexerError::config("OUTER_WINDOW_BLOCKS must be at least 1", None));
        }
        if self.poll_interval_secs == 0 {
            return Err(IndexerError::config("POLL_INTERVAL_SECS must be at least 1", None));
        }
        if self.result_cap == 0 {
            return Err(IndexerError::config("RESULT_CAP must be at least 1", None));
        }
        if self.max_retries == 0 {
            return Err(IndexerError::config("MAX_RETRIES must be at least 1", None));
        }
        if self.query_limit_cap == 0 {
            return Err(IndexerError::config("QUERY_LIMIT_CAP must be at least 1", None));
        }
        Ok(())
    }

    /// Checksummed contract address.
    #[must_use]
    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    /// Path of the contract ABI.
    #[must_use]
    pub fn abi_path(&self) -> &Path {
        &self.abi_path
    }

    /// SQLite database URL.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Query server port.
    #[must_use]
    pub const fn api_port(&self) -> u16 {
        self.api_port
    }

    /// Query server requests per minute.
    #[must_use]
    pub const fn api_rate_limit_rpm(&self) -> NonZeroU32 {
        self.api_rate_limit_rpm
    }

    /// Allowed CORS origins; `*` allows any.
    #[must_use]
    pub fn api_cors_origins(&self) -> &[String] {
        &self.api_cors_origins
    }

    /// Scanner window rules.
    #[must_use]
    pub const fn window_policy(&self) -> WindowPolicy {
        WindowPolicy {
            max_window: self.max_window_blocks,
            min_window: self.min_window_blocks,
            growth_percent: self.window_growth_percent,
            failure_backoff: Duration::from_millis(self.failure_backoff_ms),
            min_window_backoff: Duration::from_millis(self.min_window_backoff_ms),
            result_cap: self.result_cap,
        }
    }

    /// Retry policy for upstream calls.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            ..RetryPolicy::default()
        }
    }

    /// Pacing applied before each upstream request.
    #[must_use]
    pub const fn request_pacing(&self) -> RequestPacing {
        RequestPacing {
            delay: Duration::from_millis(self.request_delay_ms),
            max_jitter: Duration::from_millis(self.request_jitter_ms),
        }
    }

    /// Settings for the explorer client.
    #[must_use]
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            endpoints: self.explorer_api_urls.clone(),
            api_key: self.explorer_api_key.clone(),
            chain_id: self.chain_id,
            timeout: Duration::from_secs(self.request_timeout_secs),
            retry: self.retry_policy(),
            pacing: self.request_pacing(),
        }
    }

    /// Settings for the query server.
    #[must_use]
    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            contract_address: self.contract_address.clone(),
            featured_event: self.featured_event.clone(),
            max_limit: self.query_limit_cap,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }

    /// Settings for the HTTP listener.
    #[must_use]
    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            port: self.api_port,
            rate_limit_rpm: self.api_rate_limit_rpm,
            cors_origins: self.api_cors_origins.clone(),
        }
    }

    /// Checkpoint and polling settings.
    #[must_use]
    pub const fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            start_block: self.start_block,
            overlap_blocks: self.overlap_blocks,
            outer_window_blocks: self.outer_window_blocks,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }
}

/// Typed access to a variable source.
struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> IndexerResult<String> {
        self.get(key).ok_or_else(|| {
            IndexerError::config(format!("{key} environment variable is required"), None)
        })
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> IndexerResult<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e| {
                IndexerError::config(
                    format!("{key} must be a valid number, got: {raw}"),
                    Some(Box::new(e)),
                )
            }),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
