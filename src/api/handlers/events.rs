//! Event listing endpoints.
//!
//! All three endpoints return logs newest first, by block number then log
//! index, and are served through the short-lived query cache.

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::instrument;

use crate::api::middleware::error::ApiError;
use crate::api::models::{ErrorResponse, EventsQuery, EventsResponse, LimitQuery, DEFAULT_LIMIT};
use crate::app_state::AppState;

/// Validate a requested limit and clamp it to the server cap.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] for a limit of zero.
pub fn resolve_limit(requested: Option<u32>, cap: u32) -> Result<u32, ApiError> {
    match requested {
        Some(0) => Err(ApiError::BadRequest("limit must be at least 1".to_string())),
        Some(limit) => Ok(limit.min(cap)),
        None => Ok(DEFAULT_LIMIT.min(cap)),
    }
}

async fn events_by_name(
    state: &AppState,
    event_name: String,
    limit: u32,
) -> Result<EventsResponse, ApiError> {
    let key = format!("event:{event_name}:{limit}");
    let repository = &state.repository;
    let events = state
        .cache
        .get_or_load(key, || repository.query_by_event_name(&event_name, limit))
        .await?;

    Ok(EventsResponse {
        event_name: Some(event_name),
        limit,
        count: events.len(),
        events: events.as_ref().clone(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/events/featured",
    params(LimitQuery),
    responses(
        (status = 200, description = "Latest logs of the featured event", body = EventsResponse),
        (status = 400, description = "Invalid limit", body = ErrorResponse)
    ),
    tag = "Events"
)]
/// Latest logs of the configured featured event.
#[instrument(skip(state))]
pub async fn get_featured_events(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let limit = resolve_limit(query.limit, state.settings.max_limit)?;
    let event_name = state.settings.featured_event.clone();
    Ok(Json(events_by_name(&state, event_name, limit).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "Latest logs of the named event", body = EventsResponse),
        (status = 400, description = "Missing name or invalid limit", body = ErrorResponse)
    ),
    tag = "Events"
)]
/// Latest logs filtered by decoded event name.
#[instrument(skip(state))]
pub async fn get_events_by_name(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let event_name = query
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("name is required".to_string()))?;
    let limit = resolve_limit(query.limit, state.settings.max_limit)?;

    Ok(Json(events_by_name(&state, event_name, limit).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/logs/latest",
    params(LimitQuery),
    responses(
        (status = 200, description = "Latest logs of any kind", body = EventsResponse),
        (status = 400, description = "Invalid limit", body = ErrorResponse)
    ),
    tag = "Events"
)]
/// Latest stored logs, decoded or not.
#[instrument(skip(state))]
pub async fn get_latest_logs(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let limit = resolve_limit(query.limit, state.settings.max_limit)?;
    let repository = &state.repository;
    let events = state
        .cache
        .get_or_load(format!("latest:{limit}"), || repository.query_latest(limit))
        .await?;

    Ok(Json(EventsResponse {
        event_name: None,
        limit,
        count: events.len(),
        events: events.as_ref().clone(),
    }))
}
