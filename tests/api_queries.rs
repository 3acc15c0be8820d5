//! Query server behavior over a populated store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{deposit_log, open_store, withdraw_log, CONTRACT};
use contract_log_indexer::api::server::build_router;
use contract_log_indexer::app_state::{AppState, QuerySettings};
use contract_log_indexer::db::{LogRecord, LogRepository};
use contract_log_indexer::explorer::RawLog;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

fn query_settings(max_limit: u32) -> QuerySettings {
    QuerySettings {
        contract_address: CONTRACT.to_string(),
        featured_event: "Deposit".to_string(),
        max_limit,
        cache_ttl: Duration::from_secs(60),
    }
}

async fn store(repository: &LogRepository, logs: Vec<RawLog>) {
    let decoder = common::decoder();
    let records: Vec<LogRecord> = logs
        .into_iter()
        .map(|raw| {
            let decoded = decoder.decode(&raw.topics, &raw.data);
            LogRecord::from_raw(raw, decoded)
        })
        .collect();
    repository.insert_batch(&records).await.unwrap();
}

/// Store with Deposits at 100/0, 100/1 and 105/0 plus one undecoded log.
async fn app(max_limit: u32, rpm: u32) -> (TempDir, Arc<LogRepository>, Router) {
    let (dir, _pool, repository) = open_store().await;
    store(
        &repository,
        vec![
            deposit_log(100, 0),
            deposit_log(100, 1),
            deposit_log(105, 0),
            withdraw_log(103, 4),
        ],
    )
    .await;

    let state = AppState::new(Arc::clone(&repository), query_settings(max_limit));
    let router = build_router(state, NonZeroU32::new(rpm).unwrap(), &[]);
    (dir, repository, router)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn positions(body: &Value) -> Vec<(u64, u64)> {
    body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|event| {
            (
                event["blockNumber"].as_u64().unwrap(),
                event["logIndex"].as_u64().unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_featured_events_newest_first() {
    let (_dir, _repository, router) = app(500, 1_000).await;

    let (status, body) = get(&router, "/api/v1/events/featured?limit=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["eventName"], "Deposit");
    assert_eq!(body["count"], 2);
    assert_eq!(positions(&body), vec![(105, 0), (100, 1)]);
    assert_eq!(body["events"][0]["contractAddress"], CONTRACT);
    assert!(body["events"][0]["decodedArgs"]["amount"].is_string());
}

#[tokio::test]
async fn test_latest_logs_include_undecoded() {
    let (_dir, _repository, router) = app(500, 1_000).await;

    let (status, body) = get(&router, "/api/v1/logs/latest").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["eventName"], Value::Null);
    assert_eq!(body["limit"], 50);
    assert_eq!(positions(&body), vec![(105, 0), (103, 4), (100, 1), (100, 0)]);
    assert_eq!(body["events"][1]["eventName"], Value::Null);
    assert_eq!(body["events"][1]["decodedArgs"], Value::Null);
}

#[tokio::test]
async fn test_events_by_name() {
    let (_dir, _repository, router) = app(500, 1_000).await;

    let (status, body) = get(&router, "/api/v1/events?name=Deposit&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let (status, body) = get(&router, "/api/v1/events?name=Transfer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_invalid_parameters_rejected() {
    let (_dir, _repository, router) = app(500, 1_000).await;

    let (status, body) = get(&router, "/api/v1/logs/latest?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = get(&router, "/api/v1/events").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&router, "/api/v1/events?name=%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&router, "/api/v1/events/featured?limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_limit_clamped_to_cap() {
    let (_dir, _repository, router) = app(3, 1_000).await;

    let (status, body) = get(&router, "/api/v1/logs/latest?limit=1000").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limit"], 3);
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn test_results_cached_per_parameters() {
    let (_dir, repository, router) = app(500, 1_000).await;

    let (_, first) = get(&router, "/api/v1/logs/latest?limit=10").await;
    assert_eq!(first["count"], 4);

    store(&repository, vec![deposit_log(110, 0)]).await;

    let (_, cached) = get(&router, "/api/v1/logs/latest?limit=10").await;
    assert_eq!(cached["count"], 4);

    let (_, fresh) = get(&router, "/api/v1/logs/latest?limit=11").await;
    assert_eq!(fresh["count"], 5);
    assert_eq!(positions(&fresh)[0], (110, 0));
}

#[tokio::test]
async fn test_health_reports_store_state() {
    let (_dir, repository, router) = app(500, 1_000).await;
    repository.ensure_checkpoint(106).await.unwrap();

    let (status, body) = get(&router, "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["databaseStatus"], "healthy");
    assert_eq!(body["contractAddress"], CONTRACT);
    assert_eq!(body["lastSyncedBlock"], 106);
    assert_eq!(body["totalLogs"], 4);
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_requests() {
    let (_dir, _repository, router) = app(500, 2).await;

    assert_eq!(get(&router, "/api/v1/health").await.0, StatusCode::OK);
    assert_eq!(get(&router, "/api/v1/health").await.0, StatusCode::OK);

    let (status, body) = get(&router, "/api/v1/health").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limit_exceeded");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let (_dir, _repository, router) = app(500, 1_000).await;

    let (status, body) = get(&router, "/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Contract Log Indexer API");
}
