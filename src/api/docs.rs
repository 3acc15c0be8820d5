//! OpenAPI documentation for the REST API.

use utoipa::OpenApi;

use crate::api::handlers;

/// OpenAPI documentation for the REST API.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::events::get_featured_events,
        handlers::events::get_events_by_name,
        handlers::events::get_latest_logs,
    ),
    components(schemas(
        crate::api::models::HealthResponse,
        crate::api::models::HealthStatus,
        crate::api::models::EventsResponse,
        crate::api::models::ErrorResponse,
        crate::db::LogRecord,
    )),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Events", description = "Indexed contract logs"),
    ),
    info(
        title = "Contract Log Indexer API",
        version = "1.0.0",
        description = "Read-only queries over mirrored contract event logs",
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_all_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/health",
            "/api/v1/events/featured",
            "/api/v1/events",
            "/api/v1/logs/latest",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
