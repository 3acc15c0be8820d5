//! Short-lived in-memory cache for query results.
//!
//! Entries are keyed by endpoint and parameters and expire after a fixed
//! TTL, which absorbs bursts of identical requests without hitting SQLite
//! each time. Expired entries are dropped on the next lookup.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use quick_cache::sync::Cache;
use tracing::trace;

use crate::db::LogRecord;

/// Shared query results.
pub type CachedLogs = Arc<Vec<LogRecord>>;

#[derive(Clone)]
struct Entry {
    stored_at: Instant,
    logs: CachedLogs,
}

/// TTL cache over query results.
pub struct QueryCache {
    entries: Cache<String, Entry>,
    ttl: Duration,
}

impl QueryCache {
    /// Create a cache holding at most `capacity` result sets for `ttl`.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Cache::new(capacity.max(1)),
            ttl,
        }
    }

    /// Fresh cached result for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<CachedLogs> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            trace!(key, "Query cache hit");
            Some(entry.logs)
        } else {
            self.entries.remove(key);
            None
        }
    }

    /// Store a result for `key`.
    pub fn insert(&self, key: String, logs: CachedLogs) {
        self.entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                logs,
            },
        );
    }

    /// Cached result for `key`, or run `load` and cache its output.
    ///
    /// Errors are returned as-is and never cached.
    pub async fn get_or_load<F, Fut, E>(&self, key: String, load: F) -> Result<CachedLogs, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<LogRecord>, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let logs = Arc::new(load().await?);
        self.insert(key, Arc::clone(&logs));
        Ok(logs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_loads_once_within_ttl() {
        let cache = QueryCache::new(16, Duration::from_secs(60));
        let loads = AtomicU32::new(0);

        for _ in 0..3 {
            let logs = cache
                .get_or_load("latest:10".to_string(), || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(Vec::new())
                })
                .await
                .unwrap();
            assert!(logs.is_empty());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_reloaded() {
        let cache = QueryCache::new(16, Duration::ZERO);
        cache.insert("k".to_string(), Arc::new(Vec::new()));
        assert!(cache.get("k").is_none());
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = QueryCache::new(16, Duration::from_secs(60));
        let first: Result<CachedLogs, &str> =
            cache.get_or_load("k".to_string(), || async { Err("boom") }).await;
        assert!(first.is_err());
        assert!(cache.get("k").is_none());
    }
}
