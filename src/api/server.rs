//! Axum server setup and routing.

use std::future::Future;
use std::net::SocketAddr;
use std::num::NonZeroU32;

use axum::http::HeaderValue;
use axum::{middleware, routing::get, Router};
use eyre::WrapErr;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{docs::ApiDoc, handlers, middleware as api_middleware};
use crate::app_state::AppState;

/// Settings for the HTTP listener.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port bound on all interfaces
    pub port: u16,
    /// Requests per minute across all clients
    pub rate_limit_rpm: NonZeroU32,
    /// Allowed CORS origins; empty or `*` allows any
    pub cors_origins: Vec<String>,
}

/// Build the application router with its middleware stack.
pub fn build_router(state: AppState, rate_limit_rpm: NonZeroU32, cors_origins: &[String]) -> Router {
    let limiter = api_middleware::rate_limit::create_rate_limiter(rate_limit_rpm);

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/events/featured", get(handlers::events::get_featured_events))
        .route("/events", get(handlers::events::get_events_by_name))
        .route("/logs/latest", get(handlers::events::get_latest_logs));

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(cors_origins))
        .layer(middleware::from_fn(api_middleware::logging::log_requests))
        .layer(middleware::from_fn(move |req, next| {
            api_middleware::rate_limit::rate_limit(limiter.clone(), req, next)
        }));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_routes)
        .layer(middleware_stack)
        .with_state(state)
}

/// Run the query server until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn run_server<F>(state: AppState, settings: ServerSettings, shutdown: F) -> eyre::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state, settings.rate_limit_rpm, &settings.cors_origins);
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind query server to {addr}"))?;

    info!(addr = %addr, "Query server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .wrap_err("query server terminated unexpectedly")?;

    info!("Query server stopped");
    Ok(())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(header) => Some(header),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new().allow_origin(allowed)
}
