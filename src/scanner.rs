//! Adaptive range scanner.
//!
//! Walks an inclusive block range in sub-windows. Successful windows grow the
//! next request by `growth_percent`; failed ones halve it and back off, and
//! the same cursor is retried so no block is ever skipped. Upstream failures
//! never escape [`RangeScanner::scan_range`]; storage failures always do.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::db::{LogRecord, LogRepository};
use crate::decoder::{DecodeResult, EventDecoder};
use crate::error::IndexerResult;
use crate::explorer::LogSource;

/// Window sizing and backoff rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Largest window ever requested
    pub max_window: u64,
    /// Smallest window; failures never shrink below this
    pub min_window: u64,
    /// Growth after a success, in percent of the current window (> 100)
    pub growth_percent: u64,
    /// Sleep after a failure above the minimum window
    pub failure_backoff: Duration,
    /// Sleep after a failure at the minimum window
    pub min_window_backoff: Duration,
    /// Upstream page cap; a response this large may be truncated. Zero disables the check
    pub result_cap: usize,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            max_window: 2_000,
            min_window: 10,
            growth_percent: 135,
            failure_backoff: Duration::from_millis(1_000),
            min_window_backoff: Duration::from_millis(5_000),
            result_cap: 1_000,
        }
    }
}

impl WindowPolicy {
    /// First window for a range of `range_blocks` blocks.
    #[must_use]
    pub fn initial_window(&self, range_blocks: u64) -> u64 {
        self.max_window.min(range_blocks).max(1)
    }

    /// Window after a successful request of `window` blocks.
    #[must_use]
    pub fn grow(&self, window: u64) -> u64 {
        let grown = window.saturating_mul(self.growth_percent) / 100;
        grown.max(window.saturating_add(1)).min(self.max_window)
    }

    /// Window after a failed request of `window` blocks.
    #[must_use]
    pub fn shrink(&self, window: u64) -> u64 {
        (window / 2).max(self.min_window).max(1)
    }

    /// Sleep before retrying a failed request of `window` blocks.
    #[must_use]
    pub fn backoff(&self, window: u64) -> Duration {
        if window <= self.min_window {
            self.min_window_backoff
        } else {
            self.failure_backoff
        }
    }
}

/// One in-flight request window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    /// First block
    pub from_block: u64,
    /// Last block
    pub to_block: u64,
    /// `to_block - from_block + 1`
    pub size_blocks: u64,
}

impl ScanWindow {
    fn new(from_block: u64, window: u64, limit: u64) -> Self {
        let to_block = from_block.saturating_add(window.saturating_sub(1)).min(limit);
        Self {
            from_block,
            to_block,
            size_blocks: to_block - from_block + 1,
        }
    }
}

/// Counters for one `scan_range` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Rows newly written to the store
    pub inserted: u64,
    /// Logs returned by the upstream, duplicates included
    pub fetched: u64,
    /// Logs stored without a decoded event
    pub undecoded: u64,
    /// Upstream requests issued
    pub requests: u64,
    /// Requests that failed or looked truncated
    pub failures: u64,
    /// Smallest window requested
    pub smallest_window: Option<u64>,
}

impl ScanReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: &Self) {
        self.inserted += other.inserted;
        self.fetched += other.fetched;
        self.undecoded += other.undecoded;
        self.requests += other.requests;
        self.failures += other.failures;
        self.smallest_window = match (self.smallest_window, other.smallest_window) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Fetches, decodes and stores the logs of one contract over block ranges.
pub struct RangeScanner<S> {
    source: Arc<S>,
    decoder: Arc<EventDecoder>,
    repository: Arc<LogRepository>,
    contract_address: String,
    policy: WindowPolicy,
}

impl<S: LogSource> RangeScanner<S> {
    /// Create a scanner for `contract_address`.
    pub fn new(
        source: Arc<S>,
        decoder: Arc<EventDecoder>,
        repository: Arc<LogRepository>,
        contract_address: impl Into<String>,
        policy: WindowPolicy,
    ) -> Self {
        Self {
            source,
            decoder,
            repository,
            contract_address: contract_address.into(),
            policy,
        }
    }

    /// The upstream this scanner reads from.
    pub const fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// The window rules in use.
    pub const fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    /// Scan `[from_block, to_block]` and store every log found.
    ///
    /// Upstream failures are retried indefinitely with a shrinking window.
    ///
    /// # Errors
    ///
    /// Only storage failures are returned. Logs inserted before the failure
    /// stay in the store; the caller must not advance its checkpoint.
    #[instrument(skip(self), fields(inserted = tracing::field::Empty, requests = tracing::field::Empty))]
    pub async fn scan_range(&self, from_block: u64, to_block: u64) -> IndexerResult<ScanReport> {
        let mut report = ScanReport::default();
        if from_block > to_block {
            return Ok(report);
        }

        let mut cursor = from_block;
        let mut window = self.policy.initial_window(to_block - from_block + 1);

        loop {
            let scan = ScanWindow::new(cursor, window, to_block);
            report.requests += 1;
            report.smallest_window = Some(
                report
                    .smallest_window
                    .map_or(scan.size_blocks, |w| w.min(scan.size_blocks)),
            );

            let logs = match self
                .source
                .fetch_logs(&self.contract_address, scan.from_block, scan.to_block)
                .await
            {
                Ok(logs) => logs,
                Err(e) => {
                    report.failures += 1;
                    let backoff = self.policy.backoff(scan.size_blocks);
                    window = self.policy.shrink(scan.size_blocks);
                    warn!(
                        from = scan.from_block,
                        to = scan.to_block,
                        next_window = window,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Window failed, shrinking"
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            };

            if self.policy.result_cap > 0 && logs.len() >= self.policy.result_cap {
                if scan.size_blocks > self.policy.min_window {
                    report.failures += 1;
                    window = self.policy.shrink(scan.size_blocks);
                    debug!(
                        from = scan.from_block,
                        to = scan.to_block,
                        count = logs.len(),
                        next_window = window,
                        "Result cap reached, retrying with a smaller window"
                    );
                    continue;
                }
                warn!(
                    from = scan.from_block,
                    to = scan.to_block,
                    count = logs.len(),
                    "Result cap reached at minimum window; results may be truncated"
                );
            }

            report.fetched += logs.len() as u64;
            let records: Vec<LogRecord> = logs
                .into_iter()
                .map(|raw| {
                    let decoded = self.decoder.decode(&raw.topics, &raw.data);
                    if let DecodeResult::Failure(reason) = &decoded {
                        report.undecoded += 1;
                        debug!(
                            tx = %raw.transaction_hash,
                            log_index = raw.log_index,
                            %reason,
                            "Log not decodable with configured ABI"
                        );
                    }
                    LogRecord::from_raw(raw, decoded)
                })
                .collect();

            report.inserted += self.repository.insert_batch(&records).await?;

            debug!(
                from = scan.from_block,
                to = scan.to_block,
                fetched = records.len(),
                "Window stored"
            );

            if scan.to_block >= to_block {
                break;
            }
            cursor = scan.to_block + 1;
            window = self.policy.grow(scan.size_blocks);
        }

        let span = tracing::Span::current();
        span.record("inserted", report.inserted);
        span.record("requests", report.requests);

        info!(
            from_block,
            to_block,
            inserted = report.inserted,
            fetched = report.fetched,
            failures = report.failures,
            "Range scanned"
        );

        Ok(report)
    }
}
