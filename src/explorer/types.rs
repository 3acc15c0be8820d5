//! Wire types for the block-explorer log API and their normalized form.

use serde::Deserialize;

/// Maximum number of topics an EVM log can carry.
pub const MAX_TOPICS: usize = 4;

/// A raw log entry exactly as the explorer returns it.
///
/// Numeric fields arrive as strings, either hex (`0x1a`) or decimal.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerLog {
    /// Emitting contract
    pub address: String,
    /// Topic list; some gateways pad with nulls
    #[serde(default)]
    pub topics: Vec<Option<String>>,
    /// Hex payload
    #[serde(default)]
    pub data: String,
    /// Block height
    pub block_number: String,
    /// Block hash
    #[serde(default)]
    pub block_hash: Option<String>,
    /// Block timestamp (unix seconds)
    #[serde(default)]
    pub time_stamp: Option<String>,
    /// Transaction hash
    pub transaction_hash: String,
    /// Position of the transaction in the block
    #[serde(default)]
    pub transaction_index: Option<String>,
    /// Position of the log in the block
    #[serde(default)]
    pub log_index: Option<String>,
}

/// A log with all quantities normalized to integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract, as returned upstream
    pub address: String,
    /// Up to four topics, verbatim
    pub topics: Vec<String>,
    /// Hex payload, verbatim
    pub data: String,
    /// Block height
    pub block_number: u64,
    /// Block hash, if provided
    pub block_hash: Option<String>,
    /// Transaction hash
    pub transaction_hash: String,
    /// Position of the transaction in the block, if provided
    pub transaction_index: Option<u64>,
    /// Position of the log in the block
    pub log_index: u64,
    /// Block timestamp in unix seconds, if provided
    pub timestamp: Option<u64>,
}

impl TryFrom<ExplorerLog> for RawLog {
    type Error = String;

    fn try_from(log: ExplorerLog) -> Result<Self, Self::Error> {
        let block_number = parse_quantity(&log.block_number)
            .ok_or_else(|| format!("invalid blockNumber '{}'", log.block_number))?;

        // Etherscan encodes log index 0 as a bare "0x"
        let log_index = match log.log_index.as_deref() {
            Some(raw) => parse_quantity(raw).ok_or_else(|| format!("invalid logIndex '{raw}'"))?,
            None => return Err("missing logIndex".to_string()),
        };

        let transaction_index = log
            .transaction_index
            .as_deref()
            .map(|raw| parse_quantity(raw).ok_or_else(|| format!("invalid transactionIndex '{raw}'")))
            .transpose()?;

        // Timestamps are best-effort; an unparseable one is dropped, not fatal
        let timestamp = log.time_stamp.as_deref().and_then(parse_quantity);

        if log.transaction_hash.is_empty() {
            return Err("missing transactionHash".to_string());
        }

        let topics: Vec<String> = log.topics.into_iter().flatten().collect();
        if topics.len() > MAX_TOPICS {
            return Err(format!("log carries {} topics", topics.len()));
        }

        Ok(Self {
            address: log.address,
            topics,
            data: if log.data.is_empty() {
                "0x".to_string()
            } else {
                log.data
            },
            block_number,
            block_hash: log.block_hash.filter(|h| !h.is_empty()),
            transaction_hash: log.transaction_hash,
            transaction_index,
            log_index,
            timestamp,
        })
    }
}

/// Parse a hex (`0x`-prefixed) or decimal quantity.
///
/// A bare `0x` is zero. Returns `None` for empty or malformed input.
#[must_use]
pub fn parse_quantity(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() {
            return Some(0);
        }
        return u64::from_str_radix(hex, 16).ok();
    }
    if raw.is_empty() {
        return None;
    }
    raw.parse().ok()
}
