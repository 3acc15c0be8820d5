//! API request and response models.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::LogRecord;

/// Rows returned when no `limit` is given.
pub const DEFAULT_LIMIT: u32 = 50;

/// Query parameters carrying only a row limit.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    /// Maximum rows to return (1..; values above the server cap are clamped)
    pub limit: Option<u32>,
}

/// Query parameters for filtering by event name.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Decoded event name, e.g. `Deposit`
    pub name: Option<String>,
    /// Maximum rows to return (1..; values above the server cap are clamped)
    pub limit: Option<u32>,
}

/// A list of stored logs, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    /// Event filter applied, `null` for unfiltered queries
    pub event_name: Option<String>,
    /// Effective limit after clamping
    pub limit: u32,
    /// Number of logs returned
    pub count: usize,
    /// Logs ordered by block number then log index, descending
    pub events: Vec<LogRecord>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall health status
    pub status: HealthStatus,
    /// Application version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Indexed contract
    pub contract_address: String,
    /// Sync checkpoint, `null` before the first pass
    pub last_synced_block: Option<u64>,
    /// Number of stored logs
    pub total_logs: u64,
    /// Database status
    pub database_status: HealthStatus,
}

/// Health status states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All services healthy
    Healthy,
    /// Unhealthy state
    Unhealthy,
}

/// Error response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type
    pub error: String,
    /// Human-readable message
    pub message: String,
}
