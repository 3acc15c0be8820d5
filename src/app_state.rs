//! Shared application state for the query server.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::api::cache::QueryCache;
use crate::db::LogRepository;

/// Result sets kept in the query cache at once.
const CACHE_CAPACITY: usize = 1_024;

/// Settings for the read-only query surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySettings {
    /// Indexed contract, reported by `/health`
    pub contract_address: String,
    /// Event served by `/events/featured`
    pub featured_event: String,
    /// Upper bound for any `limit` parameter
    pub max_limit: u32,
    /// Lifetime of cached results
    pub cache_ttl: Duration,
}

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository for database access.
    pub repository: Arc<LogRepository>,
    /// Short-lived query result cache.
    pub cache: Arc<QueryCache>,
    /// Query surface settings.
    pub settings: Arc<QuerySettings>,
    /// Application start time for uptime tracking.
    pub start_time: SystemTime,
}

impl AppState {
    /// Create a new AppState instance.
    pub fn new(repository: Arc<LogRepository>, settings: QuerySettings) -> Self {
        Self {
            repository,
            cache: Arc::new(QueryCache::new(CACHE_CAPACITY, settings.cache_ttl)),
            settings: Arc::new(settings),
            start_time: SystemTime::now(),
        }
    }
}
