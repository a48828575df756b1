use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use eventscope_core::{EventHub, EventRecord, EventStore, EventType, SearchQuery, Subscription};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{
    EventView, LatestQuery, SearchParams, SearchResponse, StreamQuery, StreamSettings,
};

/// API error with status code, rendered as `{"error": ...}`
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<eventscope_core::Error> for ApiError {
    fn from(e: eventscope_core::Error) -> Self {
        warn!("request failed: {}", e);
        Self::internal("storage error")
    }
}

/// List the most recent events
#[utoipa::path(
    get,
    path = "/events/latest",
    tag = "events",
    params(LatestQuery),
    responses(
        (status = 200, description = "Most recent events, newest first", body = Vec<EventView>)
    )
)]
pub async fn latest_events(
    Extension(store): Extension<EventStore>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let records = store.latest(query.limit.unwrap_or(100)).await?;
    Ok(Json(records.into_iter().map(EventView::from).collect()))
}

/// Search historical events
#[utoipa::path(
    get,
    path = "/events/search",
    tag = "events",
    params(SearchParams),
    responses(
        (status = 200, description = "One page of matching events", body = SearchResponse),
        (status = 400, description = "Invalid event_type filter")
    )
)]
pub async fn search_events(
    Extension(store): Extension<EventStore>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let event_type = match params.event_type.as_deref() {
        Some(s) => Some(
            EventType::parse(s)
                .ok_or_else(|| ApiError::bad_request(format!("unknown event_type: {s}")))?,
        ),
        None => None,
    };

    let page = store
        .search(&SearchQuery {
            q: params.q,
            namespace: params.namespace,
            event_type,
            page: params.page,
            page_size: params.page_size,
        })
        .await?;

    Ok(Json(SearchResponse {
        items: page.items.into_iter().map(EventView::from).collect(),
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        pages: page.pages,
    }))
}

/// Live event stream (SSE)
///
/// Each frame is the full refreshed list of the last `limit` records as a
/// JSON array, newest first. A viewer that falls behind its delivery buffer
/// is disconnected and the stream ends.
#[utoipa::path(
    get,
    path = "/events/stream",
    tag = "events",
    params(StreamQuery),
    responses(
        (status = 200, description = "text/event-stream of event list frames")
    )
)]
pub async fn stream_events(
    Extension(hub): Extension<Arc<EventHub>>,
    Extension(settings): Extension<Arc<StreamSettings>>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let limit = effective_limit(query.limit, &settings);
    let (subscription, snapshot) = hub.subscribe();
    debug!(subscriber = subscription.id(), limit, "stream opened");

    struct StreamState {
        subscription: Subscription,
        hub: Arc<EventHub>,
        limit: usize,
        pending: Option<Vec<EventRecord>>,
    }

    let state = StreamState {
        subscription,
        hub,
        limit,
        pending: Some(snapshot.into_iter().take(limit).collect()),
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        if let Some(records) = state.pending.take() {
            return Some((Ok(frame(records)), state));
        }
        match state.subscription.recv().await {
            Some(_) => {
                let records = state.hub.recent(state.limit);
                Some((Ok(frame(records)), state))
            }
            // disconnected (overflow or shutdown): end the stream
            None => None,
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

pub(crate) fn effective_limit(requested: Option<u32>, settings: &StreamSettings) -> usize {
    requested
        .unwrap_or(settings.default_limit)
        .clamp(1, settings.max_limit) as usize
}

fn frame(records: Vec<EventRecord>) -> Event {
    let views: Vec<EventView> = records.into_iter().map(EventView::from).collect();
    let body = serde_json::to_string(&views).unwrap_or_else(|_| "[]".to_string());
    Event::default().data(body)
}
