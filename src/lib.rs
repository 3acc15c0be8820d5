//! # Contract Log Indexer
//!
//! Durable, incremental mirror of one smart contract's event logs, fetched
//! from a rate-limited block-explorer API and stored in SQLite.
//!
//! ## Architecture
//!
//! 1. **Decoder** ([`decoder`]) - ABI-driven log decoding into named arguments
//! 2. **Upstream client** ([`explorer`]) - explorer API calls, response
//!    classification, retry and endpoint failover
//! 3. **Range scanner** ([`scanner`]) - adaptive request windows over a block range
//! 4. **Log store** ([`db`]) - deduplicated log table and the sync checkpoint
//! 5. **Orchestrator** ([`sync`]) - one-shot and daemon catch-up passes
//!
//! Around the core sit the JSON [`export`], the read-only HTTP [`api`] and
//! the [`cli`] that wires everything from [`config`].
//!
//! ## Quick Start
//!
//! ```bash
//! export CONTRACT_ADDRESS=0x...
//! export EXPLORER_API_KEY=...
//! export ABI_PATH=./abi/Vault.json
//!
//! cargo run --release -- --once
//! cargo run --release -- --daemon
//! cargo run --release -- --export logs.json
//! cargo run --release -- --serve
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::IndexerResult<T>`](error::IndexerResult):
//!
//! ```rust
//! use contract_log_indexer::error::{IndexerError, IndexerResult};
//!
//! fn example() -> IndexerResult<()> {
//!     Err(IndexerError::config("CONTRACT_ADDRESS is not set", None))
//! }
//!
//! assert!(example().is_err());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod app_state;
pub mod cli;
pub mod config;
pub mod db;
pub mod decoder;
pub mod error;
pub mod explorer;
pub mod export;
pub mod observability;
pub mod scanner;
pub mod sync;
