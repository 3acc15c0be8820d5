//! Repository for log store operations.
//!
//! Provides deduplicated batch inserts, the monotonic sync checkpoint and
//! the read queries used by the export and query surfaces.

use sqlx::SqlitePool;
use tracing::{debug, info, instrument};

use super::models::{LogRecord, LogRow, CHECKPOINT_KEY};
use crate::error::{IndexerError, IndexerResult};

const SELECT_LOGS: &str = r#"
    SELECT transaction_hash, log_index, block_number, block_hash, transaction_index,
           contract_address, event_name, topic0, topics, data, decoded_args, timestamp
    FROM logs
"#;

/// Repository over the `logs` and `meta` tables.
///
/// Wraps a SQLite connection pool. Cheap to share behind an `Arc`.
pub struct LogRepository {
    pool: SqlitePool,
}

impl LogRepository {
    /// Creates a new repository with the given connection pool.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== LOG OPERATIONS ====================

    /// Inserts a batch of records in a single transaction.
    ///
    /// Records whose `(transaction_hash, log_index)` already exists, in the
    /// table or earlier in the same batch, are skipped. Either the whole
    /// batch is committed or nothing is.
    ///
    /// Returns the number of rows actually inserted.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use contract_log_indexer::db::{create_pool, LogRepository};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let pool = create_pool("sqlite:./indexer.db").await?;
    /// let repo = LogRepository::new(pool);
    /// let inserted = repo.insert_batch(&[]).await?;
    /// assert_eq!(inserted, 0);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self, records), fields(count = records.len(), duration_ms = tracing::field::Empty))]
    pub async fn insert_batch(&self, records: &[LogRecord]) -> IndexerResult<u64> {
        if records.is_empty() {
            debug!("Empty log batch, skipping");
            return Ok(0);
        }

        let start = std::time::Instant::now();
        let inserted_at = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(|e| {
            IndexerError::storage("Failed to start transaction", Some(Box::new(e)))
        })?;

        let mut inserted = 0_u64;
        for record in records {
            let topics = serde_json::to_string(&record.topics).map_err(|e| {
                IndexerError::storage("Failed to serialize topics", Some(Box::new(e)))
            })?;
            let decoded_args = record
                .decoded_args
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| {
                    IndexerError::storage("Failed to serialize decoded args", Some(Box::new(e)))
                })?;

            let result = sqlx::query(
                r#"
                INSERT INTO logs (
                    transaction_hash, log_index, block_number, block_hash, transaction_index,
                    contract_address, event_name, topic0, topics, data, decoded_args,
                    timestamp, inserted_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (transaction_hash, log_index) DO NOTHING
                "#,
            )
            .bind(&record.transaction_hash)
            .bind(to_i64(record.log_index, "log_index")?)
            .bind(to_i64(record.block_number, "block_number")?)
            .bind(&record.block_hash)
            .bind(record.transaction_index.map(|v| to_i64(v, "transaction_index")).transpose()?)
            .bind(&record.contract_address)
            .bind(&record.event_name)
            .bind(&record.topic0)
            .bind(topics)
            .bind(&record.data)
            .bind(decoded_args)
            .bind(record.timestamp.map(|v| to_i64(v, "timestamp")).transpose()?)
            .bind(inserted_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                IndexerError::storage(
                    format!(
                        "Failed to insert log {}:{} at block {}",
                        record.transaction_hash, record.log_index, record.block_number
                    ),
                    Some(Box::new(e)),
                )
            })?;

            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            IndexerError::storage("Failed to commit transaction", Some(Box::new(e)))
        })?;

        let duration = start.elapsed();
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        tracing::Span::current().record("duration_ms", duration_ms);

        debug!(
            received = records.len(),
            inserted,
            duplicates = records.len() as u64 - inserted,
            duration_ms,
            "Batch insert completed"
        );

        Ok(inserted)
    }

    /// Total number of stored logs.
    pub async fn count_logs(&self) -> IndexerResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM logs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexerError::storage("Failed to count logs", Some(Box::new(e))))?;

        to_u64(count)
    }

    // ==================== CHECKPOINT OPERATIONS ====================

    /// Reads the checkpoint: every block strictly below it has been scanned.
    ///
    /// Returns `None` before the first [`ensure_checkpoint`](Self::ensure_checkpoint).
    pub async fn get_checkpoint(&self) -> IndexerResult<Option<u64>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM meta WHERE key = ?")
            .bind(CHECKPOINT_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                IndexerError::storage("Failed to read checkpoint", Some(Box::new(e)))
            })?;

        row.map(|(value,)| {
            value.parse::<u64>().map_err(|e| {
                IndexerError::storage(
                    format!("Corrupt checkpoint value '{value}'"),
                    Some(Box::new(e)),
                )
            })
        })
        .transpose()
    }

    /// Seeds the checkpoint with `start_block` if none is stored yet and
    /// returns the effective checkpoint.
    #[instrument(skip(self))]
    pub async fn ensure_checkpoint(&self, start_block: u64) -> IndexerResult<u64> {
        sqlx::query(
            r#"
            INSERT INTO meta (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(CHECKPOINT_KEY)
        .bind(start_block.to_string())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::storage("Failed to seed checkpoint", Some(Box::new(e))))?;

        let checkpoint = self.get_checkpoint().await?.ok_or_else(|| {
            IndexerError::storage("Checkpoint missing right after seeding", None)
        })?;

        info!(checkpoint, "Checkpoint ready");
        Ok(checkpoint)
    }

    /// Raises the checkpoint to `block`.
    ///
    /// Only call this after the logs of every block below `block` have been
    /// inserted. A value lower than the stored one is ignored, so the
    /// checkpoint never moves backwards. Returns whether it moved.
    #[instrument(skip(self))]
    pub async fn set_checkpoint(&self, block: u64) -> IndexerResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO meta (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            WHERE CAST(meta.value AS INTEGER) < CAST(excluded.value AS INTEGER)
            "#,
        )
        .bind(CHECKPOINT_KEY)
        .bind(block.to_string())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            IndexerError::storage(
                format!("Failed to persist checkpoint {block}"),
                Some(Box::new(e)),
            )
        })?;

        let advanced = result.rows_affected() > 0;
        debug!(block, advanced, "Checkpoint update");
        Ok(advanced)
    }

    // ==================== QUERY OPERATIONS ====================

    /// Most recently observed logs first, by `(block_number, log_index)`
    /// descending.
    pub async fn query_latest(&self, limit: u32) -> IndexerResult<Vec<LogRecord>> {
        let rows = sqlx::query_as::<_, LogRow>(&format!(
            "{SELECT_LOGS} ORDER BY block_number DESC, log_index DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::storage("Failed to query latest logs", Some(Box::new(e))))?;

        rows.into_iter().map(LogRecord::try_from).collect()
    }

    /// Latest logs of one decoded event type, same ordering as
    /// [`query_latest`](Self::query_latest).
    pub async fn query_by_event_name(
        &self,
        event_name: &str,
        limit: u32,
    ) -> IndexerResult<Vec<LogRecord>> {
        let rows = sqlx::query_as::<_, LogRow>(&format!(
            "{SELECT_LOGS} WHERE event_name = ? ORDER BY block_number DESC, log_index DESC LIMIT ?"
        ))
        .bind(event_name)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            IndexerError::storage(
                format!("Failed to query logs for event {event_name}"),
                Some(Box::new(e)),
            )
        })?;

        rows.into_iter().map(LogRecord::try_from).collect()
    }

    /// Every stored log ordered by `(block_number, transaction_hash,
    /// log_index)` ascending.
    #[instrument(skip(self))]
    pub async fn export_all(&self) -> IndexerResult<Vec<LogRecord>> {
        let rows = sqlx::query_as::<_, LogRow>(&format!(
            "{SELECT_LOGS} ORDER BY block_number ASC, transaction_hash ASC, log_index ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::storage("Failed to read logs for export", Some(Box::new(e))))?;

        rows.into_iter().map(LogRecord::try_from).collect()
    }

    /// Health check for database connectivity.
    pub async fn health_check(&self) -> IndexerResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                IndexerError::storage("Database health check failed", Some(Box::new(e)))
            })?;

        Ok(())
    }
}

fn to_i64(value: u64, column: &str) -> IndexerResult<i64> {
    i64::try_from(value).map_err(|_| {
        IndexerError::storage(format!("{column} {value} does not fit in SQLite INTEGER"), None)
    })
}

fn to_u64(value: i64) -> IndexerResult<u64> {
    u64::try_from(value)
        .map_err(|_| IndexerError::storage(format!("Negative count from database: {value}"), None))
}
