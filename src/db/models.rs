//! Database models that map to SQL rows.
//!
//! [`LogRecord`] is the domain representation shared by the store, the
//! export document and the query server. [`LogRow`] is its on-disk shape,
//! with `topics` and `decoded_args` kept as JSON text.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::decoder::DecodeResult;
use crate::error::{IndexerError, IndexerResult};
use crate::explorer::RawLog;

/// `meta` key under which the sync checkpoint is stored.
pub const CHECKPOINT_KEY: &str = "last_synced_block";

/// One decoded (or decode-failed) contract log.
///
/// Identity is `(transaction_hash, log_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Transaction that emitted the log
    #[schema(example = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060")]
    pub transaction_hash: String,
    /// Position of the log within its block
    pub log_index: u64,
    /// Block height
    #[schema(example = 19_000_000)]
    pub block_number: u64,
    /// Block hash, when the upstream provided it
    pub block_hash: Option<String>,
    /// Position of the transaction within its block
    pub transaction_index: Option<u64>,
    /// EIP-55 checksummed emitter address
    pub contract_address: String,
    /// Decoded event name; `null` when decoding failed
    #[schema(example = "Deposit")]
    pub event_name: Option<String>,
    /// Raw event signature hash
    pub topic0: Option<String>,
    /// Raw topics, verbatim
    pub topics: Vec<String>,
    /// Raw payload, verbatim
    pub data: String,
    /// Named arguments; `null` when decoding failed
    #[schema(value_type = Option<Object>)]
    pub decoded_args: Option<Map<String, Value>>,
    /// Block timestamp in unix seconds, best effort
    pub timestamp: Option<u64>,
}

impl LogRecord {
    /// Build a record from a normalized upstream log and its decode outcome.
    ///
    /// A decode failure keeps the raw topics and data and leaves
    /// `event_name` and `decoded_args` empty.
    #[must_use]
    pub fn from_raw(raw: RawLog, decoded: DecodeResult) -> Self {
        let contract_address = raw
            .address
            .parse::<Address>()
            .map(|address| address.to_checksum(None))
            .unwrap_or(raw.address);

        let (event_name, decoded_args) = match decoded {
            DecodeResult::Decoded(log) => (Some(log.event_name), Some(log.args)),
            DecodeResult::Failure(_) => (None, None),
        };

        Self {
            topic0: raw.topics.first().cloned(),
            transaction_hash: raw.transaction_hash,
            log_index: raw.log_index,
            block_number: raw.block_number,
            block_hash: raw.block_hash,
            transaction_index: raw.transaction_index,
            contract_address,
            event_name,
            topics: raw.topics,
            data: raw.data,
            decoded_args,
            timestamp: raw.timestamp,
        }
    }
}

/// A `logs` row as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
#[allow(missing_docs)]
pub struct LogRow {
    pub transaction_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub block_hash: Option<String>,
    pub transaction_index: Option<i64>,
    pub contract_address: String,
    pub event_name: Option<String>,
    pub topic0: Option<String>,
    /// JSON array text
    pub topics: String,
    pub data: String,
    /// JSON object text, `NULL` when decoding failed
    pub decoded_args: Option<String>,
    pub timestamp: Option<i64>,
}

impl TryFrom<LogRow> for LogRecord {
    type Error = IndexerError;

    fn try_from(row: LogRow) -> IndexerResult<Self> {
        let topics: Vec<String> = serde_json::from_str(&row.topics).map_err(|e| {
            IndexerError::storage(
                format!("Corrupt topics for {}:{}", row.transaction_hash, row.log_index),
                Some(Box::new(e)),
            )
        })?;

        let decoded_args = row
            .decoded_args
            .as_deref()
            .map(serde_json::from_str::<Map<String, Value>>)
            .transpose()
            .map_err(|e| {
                IndexerError::storage(
                    format!(
                        "Corrupt decoded args for {}:{}",
                        row.transaction_hash, row.log_index
                    ),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            log_index: to_u64(row.log_index, "log_index")?,
            block_number: to_u64(row.block_number, "block_number")?,
            transaction_index: row
                .transaction_index
                .map(|v| to_u64(v, "transaction_index"))
                .transpose()?,
            timestamp: row.timestamp.map(|v| to_u64(v, "timestamp")).transpose()?,
            transaction_hash: row.transaction_hash,
            block_hash: row.block_hash,
            contract_address: row.contract_address,
            event_name: row.event_name,
            topic0: row.topic0,
            topics,
            data: row.data,
            decoded_args,
        })
    }
}

fn to_u64(value: i64, column: &str) -> IndexerResult<u64> {
    u64::try_from(value)
        .map_err(|_| IndexerError::storage(format!("Negative {column} in database: {value}"), None))
}
