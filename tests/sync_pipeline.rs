//! End-to-end sync passes against a simulated upstream and an on-disk store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{deposit_log, open_store, withdraw_log, ScriptedSource, CONTRACT};
use contract_log_indexer::db::LogRepository;
use contract_log_indexer::explorer::RawLog;
use contract_log_indexer::observability::init_test_tracing;
use contract_log_indexer::scanner::{RangeScanner, WindowPolicy};
use contract_log_indexer::sync::{Indexer, SyncSettings};

fn policy(max_window: u64) -> WindowPolicy {
    WindowPolicy {
        max_window,
        min_window: 10,
        growth_percent: 135,
        failure_backoff: Duration::ZERO,
        min_window_backoff: Duration::ZERO,
        result_cap: 1_000,
    }
}

fn settings(start_block: u64, overlap_blocks: u64, outer_window_blocks: u64) -> SyncSettings {
    SyncSettings {
        start_block,
        overlap_blocks,
        outer_window_blocks,
        poll_interval: Duration::from_millis(10),
    }
}

fn indexer(
    source: ScriptedSource,
    repository: &Arc<LogRepository>,
    max_window: u64,
    settings: SyncSettings,
) -> Indexer<ScriptedSource> {
    let scanner = RangeScanner::new(
        Arc::new(source),
        common::decoder(),
        Arc::clone(repository),
        CONTRACT,
        policy(max_window),
    );
    Indexer::new(scanner, Arc::clone(repository), settings)
}

fn deposits(blocks: std::ops::RangeInclusive<u64>) -> Vec<RawLog> {
    blocks.map(|block| deposit_log(block, 0)).collect()
}

#[tokio::test]
async fn test_rate_limited_range_is_fully_covered() {
    init_test_tracing();
    let (_dir, _pool, repository) = open_store().await;
    let source = ScriptedSource::new(1_999, deposits(1_000..=1_999)).rate_limited_above(200);
    let indexer = indexer(source, &repository, 500, settings(1_000, 0, 50_000));

    let report = indexer.sync_once().await.unwrap();

    assert_eq!(report.from_block, 1_000);
    assert_eq!(report.head_block, 1_999);
    assert_eq!(report.checkpoint, 2_000);
    assert_eq!(report.scan.inserted, 1_000);
    assert!(report.scan.failures > 0);
    assert!(report.scan.smallest_window.unwrap() <= 200);

    let windows = indexer.scanner().source().windows();
    assert_eq!(windows[0], (1_000, 1_499));
    assert!(windows.iter().any(|(from, to)| to - from < 200));

    let stored: Vec<u64> = repository
        .export_all()
        .await
        .unwrap()
        .iter()
        .map(|record| record.block_number)
        .collect();
    assert_eq!(stored, (1_000..=1_999).collect::<Vec<_>>());
    assert_eq!(repository.get_checkpoint().await.unwrap(), Some(2_000));
}

#[tokio::test]
async fn test_already_synced_issues_no_log_requests() {
    let (_dir, _pool, repository) = open_store().await;
    repository.ensure_checkpoint(500).await.unwrap();

    let indexer = indexer(ScriptedSource::new(499, Vec::new()), &repository, 500, settings(0, 0, 100));
    let report = indexer.sync_once().await.unwrap();

    assert!(report.up_to_date());
    assert_eq!(report.checkpoint, 500);
    assert!(indexer.scanner().source().windows().is_empty());
}

#[tokio::test]
async fn test_overlap_rescan_does_not_duplicate() {
    let (_dir, _pool, repository) = open_store().await;

    let first = indexer(
        ScriptedSource::new(1_099, deposits(1_000..=1_199)),
        &repository,
        500,
        settings(1_000, 50, 1_000),
    );
    assert_eq!(first.sync_once().await.unwrap().scan.inserted, 100);

    let second = indexer(
        ScriptedSource::new(1_199, deposits(1_000..=1_199)),
        &repository,
        500,
        settings(1_000, 50, 1_000),
    );
    let report = second.sync_once().await.unwrap();

    assert_eq!(report.from_block, 1_050);
    assert_eq!(report.scan.fetched, 150);
    assert_eq!(report.scan.inserted, 100);
    assert_eq!(repository.count_logs().await.unwrap(), 200);
    assert_eq!(repository.get_checkpoint().await.unwrap(), Some(1_200));
}

#[tokio::test]
async fn test_head_failure_leaves_checkpoint_untouched() {
    let (_dir, _pool, repository) = open_store().await;
    let indexer = indexer(
        ScriptedSource::new(1_099, deposits(1_000..=1_099)),
        &repository,
        500,
        settings(1_000, 0, 1_000),
    );
    indexer.sync_once().await.unwrap();
    assert_eq!(repository.get_checkpoint().await.unwrap(), Some(1_100));

    indexer.scanner().source().head_fails.store(true, Ordering::SeqCst);
    let err = indexer.sync_once().await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(repository.get_checkpoint().await.unwrap(), Some(1_100));
}

#[tokio::test]
async fn test_storage_failure_stops_at_last_completed_window() {
    init_test_tracing();
    let (_dir, pool, repository) = open_store().await;

    sqlx::query(
        "CREATE TRIGGER reject_late_blocks BEFORE INSERT ON logs \
         WHEN NEW.block_number >= 1500 \
         BEGIN SELECT RAISE(ABORT, 'disk full'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let indexer = indexer(
        ScriptedSource::new(1_999, deposits(1_000..=1_999)).rate_limited_above(200),
        &repository,
        500,
        settings(1_000, 0, 250),
    );

    let err = indexer.sync_once().await.unwrap_err();
    assert!(err.is_storage());
    assert_eq!(repository.get_checkpoint().await.unwrap(), Some(1_500));
    assert_eq!(repository.count_logs().await.unwrap(), 500);

    sqlx::query("DROP TRIGGER reject_late_blocks")
        .execute(&pool)
        .await
        .unwrap();

    let report = indexer.sync_once().await.unwrap();
    assert_eq!(report.from_block, 1_500);
    assert_eq!(report.checkpoint, 2_000);
    assert_eq!(repository.count_logs().await.unwrap(), 1_000);
}

#[tokio::test]
async fn test_undecodable_logs_are_stored_raw() {
    let (_dir, _pool, repository) = open_store().await;

    let mut unknown = deposit_log(1_002, 0);
    unknown.topics = vec!["0xunknownsig".to_string()];
    unknown.data = "0x".to_string();
    let logs = vec![deposit_log(1_000, 0), withdraw_log(1_001, 0), unknown];

    let indexer = indexer(ScriptedSource::new(1_002, logs), &repository, 500, settings(1_000, 0, 100));
    let report = indexer.sync_once().await.unwrap();

    assert_eq!(report.scan.inserted, 3);
    assert_eq!(report.scan.undecoded, 2);

    let stored = repository.export_all().await.unwrap();
    assert_eq!(stored[0].event_name.as_deref(), Some("Deposit"));
    assert!(stored[0].decoded_args.is_some());

    for record in &stored[1..] {
        assert_eq!(record.event_name, None);
        assert_eq!(record.decoded_args, None);
    }
    assert_eq!(stored[2].topics, vec!["0xunknownsig".to_string()]);
    assert_eq!(stored[2].data, "0x");
    assert_eq!(stored[2].contract_address, CONTRACT);
}

#[tokio::test]
async fn test_checkpoint_never_moves_backwards() {
    let (_dir, _pool, repository) = open_store().await;
    let mut observed = Vec::new();

    for head in [1_049, 1_099, 1_020, 1_199] {
        let indexer = indexer(
            ScriptedSource::new(head, deposits(1_000..=1_199)),
            &repository,
            500,
            settings(1_000, 30, 40),
        );
        indexer.sync_once().await.unwrap();
        observed.push(repository.get_checkpoint().await.unwrap().unwrap());
    }

    assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(observed.last(), Some(&1_200));
    assert_eq!(repository.count_logs().await.unwrap(), 200);
}

#[tokio::test]
async fn test_daemon_with_zero_interval_keeps_polling() {
    let (_dir, _pool, repository) = open_store().await;
    let mut zero_interval = settings(1_000, 0, 1_000);
    zero_interval.poll_interval = Duration::ZERO;
    let indexer = indexer(
        ScriptedSource::new(1_099, deposits(1_000..=1_099)),
        &repository,
        500,
        zero_interval,
    );

    let passes = tokio::time::timeout(
        Duration::from_secs(5),
        indexer.run_daemon(tokio::time::sleep(Duration::from_millis(30))),
    )
    .await
    .expect("daemon should stop on shutdown");

    assert!(passes >= 1);
    assert_eq!(repository.get_checkpoint().await.unwrap(), Some(1_100));
}

#[tokio::test]
async fn test_daemon_survives_failed_passes_and_stops_on_shutdown() {
    let (_dir, _pool, repository) = open_store().await;
    let source = ScriptedSource::new(1_099, deposits(1_000..=1_099));
    source.head_fails.store(true, Ordering::SeqCst);
    let indexer = indexer(source, &repository, 500, settings(1_000, 0, 1_000));

    let passes = tokio::time::timeout(
        Duration::from_secs(5),
        indexer.run_daemon(tokio::time::sleep(Duration::from_millis(100))),
    )
    .await
    .expect("daemon should stop on shutdown");

    assert!(passes >= 2);
    assert_eq!(repository.get_checkpoint().await.unwrap(), Some(1_000));

    indexer.scanner().source().head_fails.store(false, Ordering::SeqCst);
    let passes = indexer
        .run_daemon(tokio::time::sleep(Duration::from_millis(50)))
        .await;

    assert!(passes >= 1);
    assert_eq!(repository.get_checkpoint().await.unwrap(), Some(1_100));
    assert_eq!(repository.count_logs().await.unwrap(), 100);
}
