//! Event decoding against a runtime-loaded contract ABI.
//!
//! Logs are matched by `topic0` against the events of a JSON ABI and decoded
//! with Alloy's dynamic ABI support. Decoding is total: malformed input,
//! unknown signatures and argument mismatches all produce
//! [`DecodeResult::Failure`] instead of an error, because a shared contract
//! routinely emits events outside the tracked interface.
//!
//! ## Value mapping
//!
//! | Solidity            | JSON                                          |
//! |---------------------|-----------------------------------------------|
//! | `uintN` / `intN`    | number when `N <= 48`, decimal string above   |
//! | `address`           | EIP-55 checksummed string                     |
//! | `bool`              | boolean                                       |
//! | `bytesN` / `bytes`  | `0x`-prefixed hex string                      |
//! | `string`            | string                                        |
//! | arrays / tuples     | arrays, mapped element by element             |
//!
//! Integers never pass through a float, so 64-bit and wider values keep full
//! precision once serialized.
//!
//! ## Example
//!
//! ```
//! use contract_log_indexer::decoder::{DecodeResult, EventDecoder};
//!
//! let abi = r#"[{"type":"event","name":"Paused","anonymous":false,"inputs":[]}]"#;
//! let decoder = EventDecoder::from_json(abi).unwrap();
//!
//! let result = decoder.decode(&["0xunknownsig".to_string()], "0x");
//! assert!(matches!(result, DecodeResult::Failure(_)));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use alloy::dyn_abi::{DynSolValue, EventExt};
use alloy::json_abi::{Event, JsonAbi};
use alloy::primitives::B256;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{IndexerError, IndexerResult};

/// Widest integer (in bits) that is emitted as a JSON number.
///
/// Anything wider may exceed 2^53 and is emitted as a decimal string.
pub const MAX_NUMERIC_BITS: usize = 48;

/// Successfully decoded event.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    /// Event name from the ABI (e.g. `Deposit`)
    pub event_name: String,
    /// Named arguments; positional or unnamed parameters are omitted
    pub args: Map<String, Value>,
}

/// Why a log could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The log has no topics at all (anonymous event or empty log).
    MissingTopic0,
    /// A topic is not a 32-byte hex value.
    InvalidTopic(String),
    /// The data payload is not valid hex.
    InvalidData(String),
    /// `topic0` is not the selector of any event in the ABI.
    UnknownSignature(B256),
    /// The signature matched but topics/data do not fit the event layout.
    Mismatch {
        /// Event whose layout was attempted
        event_name: String,
        /// Underlying ABI decoder message
        reason: String,
    },
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTopic0 => write!(f, "log has no topic0"),
            Self::InvalidTopic(topic) => write!(f, "invalid topic: {topic}"),
            Self::InvalidData(reason) => write!(f, "invalid data payload: {reason}"),
            Self::UnknownSignature(sig) => write!(f, "no ABI event with signature {sig}"),
            Self::Mismatch { event_name, reason } => {
                write!(f, "log does not match {event_name} layout: {reason}")
            }
        }
    }
}

/// Outcome of decoding one raw log.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeResult {
    /// The log matched an ABI event.
    Decoded(DecodedLog),
    /// The log could not be decoded; it is still stored verbatim.
    Failure(DecodeFailure),
}

impl DecodeResult {
    /// Name of the decoded event, if any.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        match self {
            Self::Decoded(decoded) => Some(&decoded.event_name),
            Self::Failure(_) => None,
        }
    }
}

/// Decodes raw logs using the events of a contract ABI.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    events: HashMap<B256, Event>,
}

impl EventDecoder {
    /// Build a decoder from a parsed ABI.
    ///
    /// Anonymous events are skipped since they carry no `topic0` to match on.
    #[must_use]
    pub fn new(abi: &JsonAbi) -> Self {
        let events = abi
            .events()
            .filter(|event| !event.anonymous)
            .map(|event| (event.selector(), event.clone()))
            .collect();
        Self { events }
    }

    /// Parse an ABI from JSON text.
    ///
    /// Accepts either a bare ABI array or a compiler artifact object with an
    /// `abi` field (Hardhat / Foundry output).
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::ConfigError`] if the text is not a valid ABI.
    pub fn from_json(json: &str) -> IndexerResult<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            IndexerError::config("ABI definition is not valid JSON", Some(Box::new(e)))
        })?;

        let abi_value = match value {
            Value::Object(mut artifact) if artifact.contains_key("abi") => {
                artifact.remove("abi").unwrap_or(Value::Null)
            }
            other => other,
        };

        let abi: JsonAbi = serde_json::from_value(abi_value).map_err(|e| {
            IndexerError::config("ABI definition could not be parsed", Some(Box::new(e)))
        })?;

        Ok(Self::new(&abi))
    }

    /// Load and parse an ABI file.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::ConfigError`] if the file cannot be read or parsed.
    pub fn from_abi_file(path: &Path) -> IndexerResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            IndexerError::config(
                format!("Failed to read ABI file at {}", path.display()),
                Some(Box::new(e)),
            )
        })?;

        let decoder = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            events = decoder.event_count(),
            "Loaded contract ABI"
        );
        Ok(decoder)
    }

    /// Number of decodable (non-anonymous) events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Decode a log from its hex topics and hex data.
    ///
    /// Never fails: every problem is reported as [`DecodeResult::Failure`].
    #[must_use]
    pub fn decode(&self, topics: &[String], data: &str) -> DecodeResult {
        match self.try_decode(topics, data) {
            Ok(decoded) => DecodeResult::Decoded(decoded),
            Err(failure) => {
                debug!(reason = %failure, "Log not decoded");
                DecodeResult::Failure(failure)
            }
        }
    }

    fn try_decode(&self, topics: &[String], data: &str) -> Result<DecodedLog, DecodeFailure> {
        let topic0 = topics.first().ok_or(DecodeFailure::MissingTopic0)?;
        let selector = parse_topic(topic0)?;

        let event = self
            .events
            .get(&selector)
            .ok_or(DecodeFailure::UnknownSignature(selector))?;

        let parsed_topics = topics
            .iter()
            .map(|t| parse_topic(t))
            .collect::<Result<Vec<_>, _>>()?;
        let payload =
            alloy::hex::decode(data).map_err(|e| DecodeFailure::InvalidData(e.to_string()))?;

        let decoded = event
            .decode_log_parts(parsed_topics, &payload, true)
            .map_err(|e| DecodeFailure::Mismatch {
                event_name: event.name.clone(),
                reason: e.to_string(),
            })?;

        // Indexed and body values come back in separate lists; re-interleave
        // them in declaration order.
        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let mut args = Map::new();

        for input in &event.inputs {
            let value = if input.indexed {
                indexed.next()
            } else {
                body.next()
            };
            let Some(value) = value else {
                return Err(DecodeFailure::Mismatch {
                    event_name: event.name.clone(),
                    reason: "decoded argument count does not match ABI".to_string(),
                });
            };

            if is_named_argument(&input.name) {
                args.insert(input.name.clone(), to_json(value));
            }
        }

        Ok(DecodedLog {
            event_name: event.name.clone(),
            args,
        })
    }
}

fn parse_topic(topic: &str) -> Result<B256, DecodeFailure> {
    topic
        .parse::<B256>()
        .map_err(|_| DecodeFailure::InvalidTopic(topic.to_string()))
}

/// Unnamed parameters and index-like names (`"0"`, `"1"`) are positional
/// duplicates and are kept out of the argument map.
fn is_named_argument(name: &str) -> bool {
    !name.is_empty() && !name.chars().all(|c| c.is_ascii_digit())
}

/// Convert a decoded ABI value into JSON without losing integer precision.
#[allow(unreachable_patterns)]
fn to_json(value: DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(b),
        DynSolValue::Uint(n, bits) => {
            if bits <= MAX_NUMERIC_BITS {
                u64::try_from(n).map_or_else(|_| Value::String(n.to_string()), Value::from)
            } else {
                Value::String(n.to_string())
            }
        }
        DynSolValue::Int(n, bits) => {
            let text = n.to_string();
            if bits <= MAX_NUMERIC_BITS {
                text.parse::<i64>()
                    .map_or_else(|_| Value::String(text), Value::from)
            } else {
                Value::String(text)
            }
        }
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(alloy::hex::encode_prefixed(&word[..size.min(32)]))
        }
        DynSolValue::Bytes(bytes) => Value::String(alloy::hex::encode_prefixed(bytes)),
        DynSolValue::String(s) => Value::String(s),
        DynSolValue::Function(function) => Value::String(function.to_string()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.into_iter().map(to_json).collect())
        }
        other => Value::String(format!("{other:?}")),
    }
}
