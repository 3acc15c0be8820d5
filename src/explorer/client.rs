//! HTTP client for an Etherscan-compatible log API.
//!
//! Every response, including HTTP 200s, is passed through
//! [`classify_response`] because the explorer embeds its own status and
//! message fields in the body. Rate-limit and transport failures are retried
//! through [`with_retry`]; whatever survives the retries is returned to the
//! scanner, which shrinks its window and tries again.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::endpoint::EndpointSelector;
use super::retry::{random_jitter, with_retry, RetryPolicy};
use super::types::{parse_quantity, ExplorerLog, RawLog};
use crate::error::{IndexerError, IndexerResult};

/// Lower-cased phrases the explorer uses when throttling us.
///
/// Matched against the lower-cased body in [`classify_response`] only.
pub const RATE_LIMIT_PHRASES: &[&str] = &[
    "rate limit",
    "max rate limit",
    "please try again later",
];

/// Source of contract logs and chain head height.
///
/// Implemented by [`ExplorerClient`]; tests provide simulated upstreams.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch all logs emitted by `address` in the inclusive block range.
    async fn fetch_logs(&self, address: &str, from_block: u64, to_block: u64)
        -> IndexerResult<Vec<RawLog>>;

    /// Current chain head block number.
    async fn fetch_head_block_number(&self) -> IndexerResult<u64>;
}

/// Normalized interpretation of one explorer response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    /// `status = "1"` (or a JSON-RPC proxy reply) with its `result` value.
    Success(Value),
    /// Explicit "No records found": zero results, not an error.
    Empty,
    /// The explorer is throttling us.
    RateLimited(String),
    /// Non-2xx status, unparseable body or unexpected shape.
    Failure(String),
}

impl ApiOutcome {
    /// Turn non-success outcomes into retryable errors.
    fn into_result(self) -> IndexerResult<Option<Value>> {
        match self {
            Self::Success(value) => Ok(Some(value)),
            Self::Empty => Ok(None),
            Self::RateLimited(message) => Err(IndexerError::rate_limited(message)),
            Self::Failure(message) => Err(IndexerError::transport(message, None)),
        }
    }
}

/// Classify an explorer response by HTTP status and body.
///
/// Rate-limit phrases win over everything else, whatever the status code.
#[must_use]
pub fn classify_response(status: u16, body: &str) -> ApiOutcome {
    let lowered = body.to_lowercase();
    if RATE_LIMIT_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return ApiOutcome::RateLimited(truncate(body, 200));
    }

    if !(200..300).contains(&status) {
        return ApiOutcome::Failure(format!("HTTP {status}: {}", truncate(body, 200)));
    }

    let Ok(Value::Object(mut envelope)) = serde_json::from_str::<Value>(body) else {
        return ApiOutcome::Failure(format!("unparseable response: {}", truncate(body, 200)));
    };

    if let Some(error) = envelope.get("error") {
        return ApiOutcome::Failure(format!("upstream error: {error}"));
    }

    let result = envelope.remove("result");
    let message = envelope
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match envelope.get("status").and_then(Value::as_str) {
        Some("1") => result.map_or_else(
            || ApiOutcome::Failure("success response without result".to_string()),
            ApiOutcome::Success,
        ),
        Some(_) => {
            let empty_result = matches!(&result, Some(Value::Array(items)) if items.is_empty());
            if message.to_lowercase().contains("no records found") || empty_result {
                ApiOutcome::Empty
            } else {
                let detail = result
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                ApiOutcome::Failure(format!("upstream status 0: {message} {detail}").trim().to_string())
            }
        }
        // JSON-RPC proxy replies have no status field
        None => result.map_or_else(
            || ApiOutcome::Failure("unexpected response shape".to_string()),
            ApiOutcome::Success,
        ),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Fixed delay plus jitter applied before every outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPacing {
    /// Always-applied pause
    pub delay: Duration,
    /// Upper bound of the random extra pause
    pub max_jitter: Duration,
}

impl RequestPacing {
    /// No pacing at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    async fn wait(&self) {
        let pause = self.delay + random_jitter(self.max_jitter);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

/// Settings for [`ExplorerClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Gateway base URLs, tried in order
    pub endpoints: Vec<String>,
    /// Explorer API key
    pub api_key: String,
    /// Chain selector for multi-chain gateways
    pub chain_id: u64,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy for throttled or failed requests
    pub retry: RetryPolicy,
    /// Pacing applied before each request
    pub pacing: RequestPacing,
}

/// Etherscan-compatible explorer client.
pub struct ExplorerClient {
    http: reqwest::Client,
    endpoints: EndpointSelector,
    api_key: String,
    chain_id: u64,
    retry: RetryPolicy,
    pacing: RequestPacing,
}

impl ExplorerClient {
    /// Build a client.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint is configured or the HTTP client
    /// cannot be constructed.
    pub fn new(settings: ClientSettings) -> IndexerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                IndexerError::config("Failed to build HTTP client", Some(Box::new(e)))
            })?;

        let endpoints = EndpointSelector::new(settings.endpoints)?;
        info!(
            endpoints = endpoints.len(),
            chain_id = settings.chain_id,
            "Explorer client initialized"
        );

        Ok(Self {
            http,
            endpoints,
            api_key: settings.api_key,
            chain_id: settings.chain_id,
            retry: settings.retry,
            pacing: settings.pacing,
        })
    }

    /// The endpoint selector shared by all requests of this client.
    #[must_use]
    pub const fn endpoints(&self) -> &EndpointSelector {
        &self.endpoints
    }

    /// Issue one GET request and classify the response.
    async fn request(&self, params: &[(&str, String)]) -> IndexerResult<Option<Value>> {
        self.pacing.wait().await;

        let endpoint = self.endpoints.current().to_string();
        let mut query: Vec<(&str, String)> = vec![
            ("chainid", self.chain_id.to_string()),
            ("apikey", self.api_key.clone()),
        ];
        query.extend(params.iter().cloned());

        let start = Instant::now();
        let response = match self.http.get(&endpoint).query(&query).send().await {
            Ok(response) => response,
            Err(e) => {
                self.endpoints.record_failure();
                return Err(IndexerError::transport(
                    format!("request to explorer failed: {e}"),
                    Some(Box::new(e)),
                ));
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            self.endpoints.record_failure();
            IndexerError::transport("failed to read explorer response body", Some(Box::new(e)))
        })?;

        debug!(
            status,
            bytes = body.len(),
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Explorer responded"
        );

        let outcome = classify_response(status, &body);
        match &outcome {
            ApiOutcome::Success(_) | ApiOutcome::Empty => self.endpoints.record_success(),
            ApiOutcome::Failure(_) => self.endpoints.record_failure(),
            // Throttling is not the gateway's fault; stay on it
            ApiOutcome::RateLimited(_) => {}
        }
        outcome.into_result()
    }

    async fn fetch_logs_once(
        &self,
        address: &str,
        from_block: u64,
        to_block: u64,
    ) -> IndexerResult<Vec<RawLog>> {
        let params = [
            ("module", "logs".to_string()),
            ("action", "getLogs".to_string()),
            ("address", address.to_string()),
            ("fromBlock", from_block.to_string()),
            ("toBlock", to_block.to_string()),
        ];

        let Some(result) = self.request(&params).await? else {
            return Ok(Vec::new());
        };

        let entries: Vec<ExplorerLog> = serde_json::from_value(result).map_err(|e| {
            IndexerError::transport("unexpected log list shape", Some(Box::new(e)))
        })?;

        entries
            .into_iter()
            .map(|entry| {
                RawLog::try_from(entry)
                    .map_err(|reason| IndexerError::transport(format!("malformed log: {reason}"), None))
            })
            .collect()
    }

    async fn fetch_head_once(&self) -> IndexerResult<u64> {
        let params = [
            ("module", "proxy".to_string()),
            ("action", "eth_blockNumber".to_string()),
        ];

        let result = self
            .request(&params)
            .await?
            .ok_or_else(|| IndexerError::transport("empty block number response", None))?;

        result
            .as_str()
            .and_then(parse_quantity)
            .ok_or_else(|| IndexerError::transport(format!("invalid block number: {result}"), None))
    }
}

#[async_trait]
impl LogSource for ExplorerClient {
    #[instrument(skip(self), fields(count = tracing::field::Empty))]
    async fn fetch_logs(
        &self,
        address: &str,
        from_block: u64,
        to_block: u64,
    ) -> IndexerResult<Vec<RawLog>> {
        let logs = with_retry(&self.retry, "getLogs", IndexerError::is_retryable, || {
            self.fetch_logs_once(address, from_block, to_block)
        })
        .await?;

        tracing::Span::current().record("count", logs.len());
        Ok(logs)
    }

    #[instrument(skip(self), fields(block = tracing::field::Empty))]
    async fn fetch_head_block_number(&self) -> IndexerResult<u64> {
        let head = with_retry(&self.retry, "eth_blockNumber", IndexerError::is_retryable, || {
            self.fetch_head_once()
        })
        .await?;

        tracing::Span::current().record("block", head);
        Ok(head)
    }
}
