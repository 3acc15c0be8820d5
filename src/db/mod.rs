//! Persistent log store.
//!
//! This module provides SQLite-based storage for:
//! - Decoded (or decode-failed) contract logs, deduplicated on
//!   `(transaction_hash, log_index)`
//! - The sync checkpoint, kept in a small key/value `meta` table
//!
//! # Architecture
//!
//! - `models`: Data structures that map to database rows
//! - `repository`: Inserts, checkpoint handling and read queries
//! - Connection pooling with SQLite WAL mode so the query server can read
//!   while the indexer writes
//! - Schema versioning through `sqlx` migrations in `migrations/`

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{IndexerError, IndexerResult};

pub mod models;
pub mod repository;

pub use models::{LogRecord, CHECKPOINT_KEY};
pub use repository::LogRepository;

/// Tables that must exist once migrations have run.
const REQUIRED_TABLES: [&str; 2] = ["meta", "logs"];

/// Creates a SQLite connection pool from a `sqlite:` URL and applies
/// migrations.
///
/// # Configuration
///
/// - **WAL mode**: readers are not blocked by the writer
/// - **Busy timeout**: 30 seconds to ride out lock contention
/// - **Max connections**: 5, **min connections**: 1
///
/// # Example
///
/// ```no_run
/// use contract_log_indexer::db::create_pool;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool("sqlite:./indexer.db").await?;
///     Ok(())
/// }
/// ```
pub async fn create_pool(database_url: &str) -> IndexerResult<SqlitePool> {
    info!(database_url, "Connecting to database");

    let options = SqliteConnectOptions::from_str(database_url).map_err(|e| {
        IndexerError::storage(
            format!("Failed to parse database URL: {database_url}"),
            Some(Box::new(e)),
        )
    })?;

    connect(options, database_url).await
}

/// Creates a pool for a database file at `path`.
///
/// Used by tests that keep their database inside a temporary directory.
pub async fn create_pool_at(path: &Path) -> IndexerResult<SqlitePool> {
    let options = SqliteConnectOptions::new().filename(path);
    connect(options, &path.display().to_string()).await
}

async fn connect(options: SqliteConnectOptions, label: &str) -> IndexerResult<SqlitePool> {
    let options = options
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| {
            IndexerError::storage(
                format!("Failed to connect to database at {label}"),
                Some(Box::new(e)),
            )
        })?;

    info!("Running database migrations");
    run_migrations(&pool).await?;
    verify_database(&pool).await?;
    info!("Database migrations complete");

    Ok(pool)
}

/// Applies all pending migrations from `migrations/`.
///
/// Safe to call repeatedly; applied migrations are skipped.
pub async fn run_migrations(pool: &SqlitePool) -> IndexerResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            IndexerError::storage("Failed to run database migrations", Some(Box::new(e)))
        })?;

    Ok(())
}

/// Verify that required tables exist after migrations.
pub async fn verify_database(pool: &SqlitePool) -> IndexerResult<()> {
    let rows = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT name FROM sqlite_master
        WHERE type = 'table' AND name IN ('meta', 'logs')
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| {
        IndexerError::storage("Failed to verify database schema", Some(Box::new(e)))
    })?;

    if rows.len() < REQUIRED_TABLES.len() {
        return Err(IndexerError::storage(
            format!(
                "Database schema incomplete. Expected {} tables, found {}",
                REQUIRED_TABLES.len(),
                rows.len()
            ),
            None,
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_pool_and_migrations() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pool = create_pool_at(&dir.path().join("indexer.db"))
            .await
            .expect("Failed to create pool");

        // Running again is a no-op
        run_migrations(&pool)
            .await
            .expect("Failed to re-run migrations");

        let indices: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_logs_%'",
        )
        .fetch_all(&pool)
        .await
        .expect("Failed to query indices");

        assert_eq!(indices.len(), 3, "Expected block, event and timestamp indices");
    }

    #[tokio::test]
    async fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pool = create_pool_at(&dir.path().join("indexer.db"))
            .await
            .expect("Failed to create pool");

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("Failed to query journal mode");

        assert_eq!(result.0.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_invalid_url_is_storage_error() {
        let result = create_pool("postgres://nope").await;
        assert!(matches!(result, Err(IndexerError::StorageError { .. })));
    }
}
