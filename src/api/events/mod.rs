//! Events API endpoints
//!
//! GET /events/latest - Most recent events
//! GET /events/search - Paginated historical search
//! GET /events/stream - Live SSE feed of full-list frames

pub mod handlers;
pub mod types;

#[cfg(test)]
mod tests;

pub use handlers::{latest_events, search_events, stream_events};
pub use types::{EventView, LatestQuery, SearchParams, SearchResponse, StreamQuery, StreamSettings};

use axum::{routing::get, Router};

/// Create events routes
pub fn events_routes() -> Router {
    Router::new()
        .route("/events/latest", get(latest_events))
        .route("/events/search", get(search_events))
        .route("/events/stream", get(stream_events))
}
