//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{address, Address, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use contract_log_indexer::db::{create_pool_at, LogRepository};
use contract_log_indexer::decoder::EventDecoder;
use contract_log_indexer::error::{IndexerError, IndexerResult};
use contract_log_indexer::explorer::{LogSource, RawLog};
use sqlx::SqlitePool;
use tempfile::TempDir;

sol! {
    event Deposit(address indexed user, uint256 amount);
    event Withdraw(address indexed user, uint256 amount);
}

/// ABI covering `Deposit` only, so `Withdraw` logs stay undecoded.
pub const DEPOSIT_ABI: &str = r#"[
    {"type":"event","name":"Deposit","anonymous":false,"inputs":[
        {"name":"user","type":"address","indexed":true},
        {"name":"amount","type":"uint256","indexed":false}
    ]}
]"#;

pub const CONTRACT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

pub fn user() -> Address {
    address!("fB6916095ca1df60bB79Ce92cE3Ea74c37c5d359")
}

pub fn decoder() -> Arc<EventDecoder> {
    Arc::new(EventDecoder::from_json(DEPOSIT_ABI).unwrap())
}

fn raw_log(event: &impl SolEvent, block: u64, log_index: u64) -> RawLog {
    let encoded = event.encode_log_data();
    RawLog {
        address: CONTRACT.to_lowercase(),
        topics: encoded.topics().iter().map(ToString::to_string).collect(),
        data: alloy::hex::encode_prefixed(&encoded.data),
        block_number: block,
        block_hash: Some(format!("0x{block:064x}")),
        transaction_hash: format!("0x{:062x}{log_index:02x}", block),
        transaction_index: Some(0),
        log_index,
        timestamp: Some(1_700_000_000 + block * 12),
    }
}

pub fn deposit_log(block: u64, log_index: u64) -> RawLog {
    raw_log(
        &Deposit {
            user: user(),
            amount: U256::from(block * 1_000 + log_index),
        },
        block,
        log_index,
    )
}

pub fn withdraw_log(block: u64, log_index: u64) -> RawLog {
    raw_log(
        &Withdraw {
            user: user(),
            amount: U256::from(1u64),
        },
        block,
        log_index,
    )
}

/// Fresh on-disk store in a temporary directory.
pub async fn open_store() -> (TempDir, SqlitePool, Arc<LogRepository>) {
    let dir = tempfile::tempdir().unwrap();
    let pool = create_pool_at(&dir.path().join("indexer.db")).await.unwrap();
    let repository = Arc::new(LogRepository::new(pool.clone()));
    (dir, pool, repository)
}

/// Simulated upstream serving a fixed set of logs.
///
/// Windows wider than `fail_above` blocks are rate limited, and the head
/// request can be made to fail.
pub struct ScriptedSource {
    pub head: u64,
    pub logs: Vec<RawLog>,
    pub fail_above: u64,
    pub head_fails: AtomicBool,
    pub windows: Mutex<Vec<(u64, u64)>>,
}

impl ScriptedSource {
    pub fn new(head: u64, logs: Vec<RawLog>) -> Self {
        Self {
            head,
            logs,
            fail_above: u64::MAX,
            head_fails: AtomicBool::new(false),
            windows: Mutex::new(Vec::new()),
        }
    }

    pub fn rate_limited_above(mut self, blocks: u64) -> Self {
        self.fail_above = blocks;
        self
    }

    pub fn windows(&self) -> Vec<(u64, u64)> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogSource for ScriptedSource {
    async fn fetch_logs(&self, _address: &str, from: u64, to: u64) -> IndexerResult<Vec<RawLog>> {
        self.windows.lock().unwrap().push((from, to));
        if to - from + 1 > self.fail_above {
            return Err(IndexerError::rate_limited("Max calls per sec rate limit reached (5/sec)"));
        }
        Ok(self
            .logs
            .iter()
            .filter(|log| (from..=to).contains(&log.block_number))
            .cloned()
            .collect())
    }

    async fn fetch_head_block_number(&self) -> IndexerResult<u64> {
        if self.head_fails.load(Ordering::SeqCst) {
            return Err(IndexerError::transport("connection reset by peer", None));
        }
        Ok(self.head)
    }
}
