//! Health check endpoint.

use axum::{extract::State, Json};
use std::time::SystemTime;
use tracing::instrument;

use crate::api::middleware::error::ApiError;
use crate::api::models::{HealthResponse, HealthStatus};
use crate::app_state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    ),
    tag = "Health"
)]
/// Returns service health, the sync checkpoint and the stored log count.
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let uptime = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    let database_status = match state.repository.health_check().await {
        Ok(()) => HealthStatus::Healthy,
        Err(_) => HealthStatus::Unhealthy,
    };

    let (last_synced_block, total_logs) = if database_status == HealthStatus::Healthy {
        (
            state.repository.get_checkpoint().await?,
            state.repository.count_logs().await?,
        )
    } else {
        (None, 0)
    };

    Ok(Json(HealthResponse {
        status: database_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        contract_address: state.settings.contract_address.clone(),
        last_synced_block,
        total_logs,
        database_status,
    }))
}
