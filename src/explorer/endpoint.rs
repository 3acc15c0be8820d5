//! Gateway endpoint selection.
//!
//! One [`EndpointSelector`] is built at startup from the configured gateway
//! URLs and handed to the client. It remembers the last endpoint that
//! answered and when, and rotates to the next URL after a failure.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{IndexerError, IndexerResult};

/// Rotating selector over a fixed list of gateway base URLs.
#[derive(Debug)]
pub struct EndpointSelector {
    endpoints: Vec<String>,
    current: AtomicUsize,
    /// Unix millis of the last successful response, 0 when never
    last_success_ms: AtomicI64,
}

impl EndpointSelector {
    /// Create a selector. The first URL is used until it fails.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::ConfigError`] if no endpoint is given.
    pub fn new(endpoints: Vec<String>) -> IndexerResult<Self> {
        if endpoints.is_empty() {
            return Err(IndexerError::config(
                "At least one explorer API URL is required",
                None,
            ));
        }
        Ok(Self {
            endpoints,
            current: AtomicUsize::new(0),
            last_success_ms: AtomicI64::new(0),
        })
    }

    /// The endpoint to use for the next request.
    #[must_use]
    pub fn current(&self) -> &str {
        let index = self.current.load(Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[index]
    }

    /// Number of configured endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; a selector holds at least one endpoint.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Record that the current endpoint answered successfully.
    pub fn record_success(&self) {
        self.last_success_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Record a failure on the current endpoint and move to the next one.
    pub fn record_failure(&self) {
        if self.endpoints.len() < 2 {
            return;
        }
        let previous = self.current.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        warn!(
            failed = %self.endpoints[previous],
            next = %self.current(),
            last_success = ?self.last_success(),
            "Rotating explorer endpoint"
        );
    }

    /// Time of the last successful response, if any.
    #[must_use]
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        match self.last_success_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }
}
