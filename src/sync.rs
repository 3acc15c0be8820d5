//! Sync orchestration.
//!
//! One pass reads the checkpoint, asks the upstream for the chain head and
//! scans the gap in fixed-size outer windows. The checkpoint is raised only
//! after an outer window's logs are stored, so an interrupted pass resumes
//! from the last completed window on the next run.
//!
//! Daemon mode repeats the pass on an interval. A failed pass is logged and
//! the loop carries on; nothing short of the shutdown signal stops it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::db::LogRepository;
use crate::error::IndexerResult;
use crate::explorer::LogSource;
use crate::scanner::{RangeScanner, ScanReport};

/// Shortest daemon interval; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Checkpoint and pacing settings for sync passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Checkpoint seeded on first run
    pub start_block: u64,
    /// Blocks below the checkpoint that are scanned again on every pass
    pub overlap_blocks: u64,
    /// Blocks per checkpointed outer window
    pub outer_window_blocks: u64,
    /// Delay between daemon passes
    pub poll_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            start_block: 0,
            overlap_blocks: 50,
            outer_window_blocks: 50_000,
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// First block scanned (checkpoint minus overlap)
    pub from_block: u64,
    /// Chain head observed at the start of the pass
    pub head_block: u64,
    /// Checkpoint after the pass
    pub checkpoint: u64,
    /// Aggregated scanner counters
    pub scan: ScanReport,
}

impl SyncReport {
    /// True when the pass found nothing to scan.
    #[must_use]
    pub const fn up_to_date(&self) -> bool {
        self.scan.requests == 0
    }
}

/// Drives sync passes for one contract against one store.
pub struct Indexer<S> {
    scanner: RangeScanner<S>,
    repository: Arc<LogRepository>,
    settings: SyncSettings,
}

impl<S: LogSource> Indexer<S> {
    /// Create an indexer.
    pub fn new(
        scanner: RangeScanner<S>,
        repository: Arc<LogRepository>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            scanner,
            repository,
            settings: SyncSettings {
                outer_window_blocks: settings.outer_window_blocks.max(1),
                poll_interval: settings.poll_interval.max(MIN_POLL_INTERVAL),
                ..settings
            },
        }
    }

    /// The scanner used for each outer window.
    pub const fn scanner(&self) -> &RangeScanner<S> {
        &self.scanner
    }

    /// Run one catch-up pass from the checkpoint to the current head.
    ///
    /// # Errors
    ///
    /// Returns the upstream error if the chain head cannot be fetched, or a
    /// storage error from inserting logs or persisting the checkpoint. In
    /// both cases the checkpoint stays at the last completed outer window.
    #[instrument(skip(self))]
    pub async fn sync_once(&self) -> IndexerResult<SyncReport> {
        let start = Instant::now();
        let checkpoint = self
            .repository
            .ensure_checkpoint(self.settings.start_block)
            .await?;
        let head_block = self.scanner.source().fetch_head_block_number().await?;
        let from_block = checkpoint.saturating_sub(self.settings.overlap_blocks);

        let mut report = SyncReport {
            from_block,
            head_block,
            checkpoint,
            scan: ScanReport::default(),
        };

        if from_block > head_block {
            debug!(checkpoint, head_block, "Already synced past head");
            return Ok(report);
        }

        info!(
            from_block,
            head_block,
            checkpoint,
            blocks = head_block - from_block + 1,
            "Starting sync pass"
        );

        let mut window_start = from_block;
        loop {
            let window_end = window_start
                .saturating_add(self.settings.outer_window_blocks - 1)
                .min(head_block);

            let scanned = self.scanner.scan_range(window_start, window_end).await?;
            report.scan.merge(&scanned);

            let next = window_end.saturating_add(1);
            self.repository.set_checkpoint(next).await?;
            report.checkpoint = report.checkpoint.max(next);

            debug!(
                window_start,
                window_end,
                inserted = scanned.inserted,
                checkpoint = report.checkpoint,
                "Outer window complete"
            );

            if window_end >= head_block {
                break;
            }
            window_start = window_end + 1;
        }

        info!(
            inserted = report.scan.inserted,
            fetched = report.scan.fetched,
            undecoded = report.scan.undecoded,
            failures = report.scan.failures,
            checkpoint = report.checkpoint,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Sync pass complete"
        );

        Ok(report)
    }

    /// Repeat [`sync_once`](Self::sync_once) every poll interval until
    /// `shutdown` resolves. Returns the number of passes run.
    ///
    /// Errors from a pass are logged and never end the loop. The shutdown
    /// signal is only observed between passes.
    pub async fn run_daemon<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            "Starting sync daemon"
        );

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        let mut passes = 0_u64;

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(passes, "Shutdown signal received, stopping daemon");
                    break;
                }
                _ = ticker.tick() => {}
            }

            passes += 1;
            match self.sync_once().await {
                Ok(report) if report.up_to_date() => {
                    debug!(pass = passes, head = report.head_block, "Nothing new to scan");
                }
                Ok(report) => {
                    info!(
                        pass = passes,
                        inserted = report.scan.inserted,
                        checkpoint = report.checkpoint,
                        "Pass finished"
                    );
                }
                Err(e) if e.is_storage() => {
                    error!(
                        pass = passes,
                        error = %e,
                        "STORAGE FAILURE during sync pass; checkpoint not advanced, retrying next interval"
                    );
                }
                Err(e) => {
                    warn!(pass = passes, error = %e, "Sync pass aborted, retrying next interval");
                }
            }
        }

        passes
    }
}
