//! JSON export of the whole log store.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::db::{LogRecord, LogRepository};
use crate::error::{IndexerError, IndexerResult};

/// Exported document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// Indexed contract
    pub contract_address: String,
    /// Stored checkpoint, `null` if no sync ever ran
    pub last_synced_block: Option<u64>,
    /// When the export was taken
    pub exported_at: DateTime<Utc>,
    /// Number of logs below
    pub count: usize,
    /// Every log, ascending by block, transaction hash and log index
    pub logs: Vec<LogRecord>,
}

/// Build the export document from the store.
pub async fn build_document(
    repository: &LogRepository,
    contract_address: &str,
) -> IndexerResult<ExportDocument> {
    let last_synced_block = repository.get_checkpoint().await?;
    let logs = repository.export_all().await?;

    Ok(ExportDocument {
        contract_address: contract_address.to_string(),
        last_synced_block,
        exported_at: Utc::now(),
        count: logs.len(),
        logs,
    })
}

/// Write the whole store to `path` as pretty-printed JSON.
///
/// Returns the document that was written.
///
/// # Errors
///
/// Storage errors from reading the store, or [`IndexerError::ExportError`]
/// if the file cannot be written.
#[instrument(skip(repository))]
pub async fn export_to_file(
    repository: &LogRepository,
    path: &Path,
    contract_address: &str,
) -> IndexerResult<ExportDocument> {
    let document = build_document(repository, contract_address).await?;

    let file = File::create(path).map_err(|e| {
        IndexerError::export(format!("Cannot create {}", path.display()), Some(Box::new(e)))
    })?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, &document).map_err(|e| {
        IndexerError::export(format!("Cannot write {}", path.display()), Some(Box::new(e)))
    })?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .map_err(|e| {
            IndexerError::export(format!("Cannot flush {}", path.display()), Some(Box::new(e)))
        })?;

    info!(count = document.count, path = %path.display(), "Export written");
    Ok(document)
}
