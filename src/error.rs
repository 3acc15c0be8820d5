//! Error types for the contract log indexer.
//!
//! This module provides a unified error type [`IndexerError`] covering every
//! failure that can leave a component. Decode failures are deliberately absent:
//! a log that does not match the ABI is a normal
//! [`DecodeResult::Failure`](crate::decoder::DecodeResult::Failure), not an error.
//!
//! # Design
//!
//! The variants follow how each failure is handled:
//! - [`IndexerError::ConfigError`]: fatal at startup only
//! - [`IndexerError::RateLimited`]: retryable, absorbed by the scanner
//! - [`IndexerError::TransportError`]: retryable, handled like rate limiting
//! - [`IndexerError::StorageError`]: fatal for the current pass, never absorbed
//! - [`IndexerError::ExportError`]: export file could not be written
//! - [`IndexerError::ServerError`]: query server failed to bind or serve
//!
//! # Example
//!
//! ```
//! use contract_log_indexer::error::{IndexerError, IndexerResult};
//!
//! fn validate_window(min: u64, max: u64) -> IndexerResult<()> {
//!     if min > max {
//!         return Err(IndexerError::config(
//!             "MIN_WINDOW_BLOCKS must not exceed MAX_WINDOW_BLOCKS",
//!             None,
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`IndexerError`].
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Boxed source error carried by most variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the indexer.
#[derive(Debug)]
pub enum IndexerError {
    /// Configuration or environment variable errors.
    ///
    /// Variants include:
    /// - Missing contract address, API key or ABI path
    /// - Unreadable or malformed ABI file
    /// - Out-of-range window or retry settings
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// The upstream API reported that we are sending too many requests.
    RateLimited {
        /// Diagnostic text returned by the upstream
        message: String,
    },

    /// Network, HTTP status or response-shape failures talking to the upstream.
    TransportError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// Database operation errors.
    ///
    /// Variants include:
    /// - Connection or migration failures
    /// - Failed batch insert or checkpoint write
    /// - Rows that cannot be converted back into records
    StorageError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// Export file could not be created or written.
    ExportError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// Query server failed to start or stopped with an error.
    ServerError {
        /// Human-readable error message
        message: String,
    },
}

impl IndexerError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use contract_log_indexer::error::IndexerError;
    ///
    /// let err = IndexerError::config("CONTRACT_ADDRESS not set", None);
    /// assert!(matches!(err, IndexerError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new rate-limit error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Create a new transport error.
    ///
    /// # Example
    ///
    /// ```
    /// use contract_log_indexer::error::IndexerError;
    ///
    /// let err = IndexerError::transport("HTTP 502", None);
    /// assert!(err.is_retryable());
    /// ```
    #[must_use]
    pub fn transport(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::TransportError {
            message: message.into(),
            source,
        }
    }

    /// Create a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::StorageError {
            message: message.into(),
            source,
        }
    }

    /// Create a new export error.
    #[must_use]
    pub fn export(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::ExportError {
            message: message.into(),
            source,
        }
    }

    /// Create a new query server error.
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::ServerError {
            message: message.into(),
        }
    }

    /// Whether the failure is transient upstream trouble worth retrying.
    ///
    /// Rate limiting and transport failures are treated identically: upstream
    /// flakiness cannot be told apart from overload.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::TransportError { .. })
    }

    /// Whether the failure threatens persisted state.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::StorageError { .. })
    }
}

impl fmt::Display for IndexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::RateLimited { message } => write!(f, "Rate limited: {message}"),
            Self::TransportError { message, .. } => write!(f, "Transport error: {message}"),
            Self::StorageError { message, .. } => write!(f, "Storage error: {message}"),
            Self::ExportError { message, .. } => write!(f, "Export error: {message}"),
            Self::ServerError { message } => write!(f, "Server error: {message}"),
        }
    }
}

impl std::error::Error for IndexerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::TransportError { source, .. }
            | Self::StorageError { source, .. }
            | Self::ExportError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::RateLimited { .. } | Self::ServerError { .. } => None,
        }
    }
}

/// Convert from `eyre::Report` to `IndexerError`.
///
/// Reports only originate from the query server, so they become
/// [`IndexerError::ServerError`] with the full context chain flattened.
impl From<eyre::Report> for IndexerError {
    fn from(err: eyre::Report) -> Self {
        Self::ServerError {
            message: format!("{err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error() {
        let err = IndexerError::config("test error", None);
        assert!(matches!(err, IndexerError::ConfigError { .. }));
        assert_eq!(err.to_string(), "Configuration error: test error");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(IndexerError::rate_limited("Max rate limit reached").is_retryable());
        assert!(IndexerError::transport("HTTP 503", None).is_retryable());
        assert!(!IndexerError::storage("disk full", None).is_retryable());
        assert!(!IndexerError::export("read-only", None).is_retryable());
    }

    #[test]
    fn test_storage_error() {
        let err = IndexerError::storage("commit failed", None);
        assert!(err.is_storage());
        assert_eq!(err.to_string(), "Storage error: commit failed");
    }

    #[test]
    fn test_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = IndexerError::config("failed to read ABI", Some(Box::new(source)));

        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Configuration error: failed to read ABI");
    }

    #[test]
    fn test_eyre_report_becomes_server_error() {
        let report = eyre::eyre!("address in use").wrap_err("failed to bind");
        let err = IndexerError::from(report);
        assert!(matches!(err, IndexerError::ServerError { .. }));
        assert!(err.to_string().contains("address in use"));
    }
}
