//! API Documentation - Swagger UI
//!
//! Provides OpenAPI documentation at /docs

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::events::{EventView, LatestQuery, SearchParams, SearchResponse, StreamQuery};

/// Eventscope OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Eventscope API",
        version = "1.0.0",
        description = "Kubernetes event watcher REST API.

## Overview
Eventscope watches a namespace's events, coalesces repeats into counted
records, and serves:
- **Latest**: the most recent records
- **Search**: paginated historical search with filters
- **Stream**: a live SSE feed of full-list frames

Health endpoints (`/healthz`, `/readyz`) and Prometheus metrics
(`/metrics`) live outside this schema.
",
        license(name = "MIT")
    ),
    paths(
        super::events::handlers::latest_events,
        super::events::handlers::search_events,
        super::events::handlers::stream_events,
    ),
    components(schemas(
        EventView,
        SearchResponse,
        LatestQuery,
        SearchParams,
        StreamQuery,
    )),
    tags(
        (name = "events", description = "Event listing, search, and live stream")
    )
)]
pub struct ApiDoc;

/// Create documentation routes
pub fn docs_routes() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
