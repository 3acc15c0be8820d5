//! File logging delivers buffered events once the writer guard is dropped.
//!
//! Lives in its own test binary because it installs the global subscriber.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use contract_log_indexer::observability::init_tracing;
use tracing::error;

#[test]
fn test_dropping_guard_flushes_final_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs/indexer.log");

    let guard = init_tracing(None, Some(path.clone()), false)
        .unwrap()
        .expect("file logging returns a guard");

    error!(target: "contract_log_indexer", error = "disk full", "Application error");
    drop(guard);

    let written: String = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect();
    assert!(written.contains("Application error"), "log file was: {written}");
    assert!(written.contains("disk full"));
}
