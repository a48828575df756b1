use super::handlers::effective_limit;
use super::types::{EventView, SearchParams, SearchResponse, StreamQuery, StreamSettings};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Extension;
use chrono::Utc;
use eventscope_core::metrics::Gauge;
use eventscope_core::{EventHub, EventRecord, EventType};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn record(id: i64) -> EventRecord {
    EventRecord {
        id,
        observed_at: Utc::now(),
        event_type: EventType::Warning,
        reason: "BackOff".to_string(),
        message: "pod crash".to_string(),
        namespace: "demo".to_string(),
        involved_kind: "Pod".to_string(),
        involved_name: "crashme".to_string(),
        count: 3,
        first_seen: Utc::now(),
        last_seen: Utc::now(),
        source_cursor: Some("17".to_string()),
    }
}

#[test]
fn test_event_view_serialization() {
    let view = EventView::from(record(7));
    let json = serde_json::to_string(&view).unwrap();
    assert!(json.contains("\"event_type\":\"Warning\""));
    assert!(json.contains("\"count\":3"));
    // internal resume bookkeeping stays off the wire
    assert!(!json.contains("source_cursor"));
}

#[test]
fn test_search_params_defaults() {
    let params: SearchParams = serde_urlencoded::from_str("").unwrap();
    assert_eq!(params.page, 1);
    assert_eq!(params.page_size, 20);
    assert!(params.q.is_none());
    assert!(params.event_type.is_none());
}

#[test]
fn test_search_params_deserialization() {
    let params: SearchParams =
        serde_urlencoded::from_str("q=BackOff&namespace=demo&event_type=Warning&page=3&page_size=50")
            .unwrap();
    assert_eq!(params.q.as_deref(), Some("BackOff"));
    assert_eq!(params.namespace.as_deref(), Some("demo"));
    assert_eq!(params.event_type.as_deref(), Some("Warning"));
    assert_eq!(params.page, 3);
    assert_eq!(params.page_size, 50);
}

#[test]
fn test_search_response_shape() {
    let response = SearchResponse {
        items: vec![EventView::from(record(1))],
        total: 41,
        page: 1,
        page_size: 20,
        pages: 3,
    };
    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"total\":41"));
    assert!(json.contains("\"pages\":3"));
    assert!(json.contains("\"items\":["));
}

#[test]
fn test_stream_query_deserialization() {
    let query: StreamQuery = serde_urlencoded::from_str("limit=250").unwrap();
    assert_eq!(query.limit, Some(250));
    let query: StreamQuery = serde_urlencoded::from_str("").unwrap();
    assert_eq!(query.limit, None);
}

#[tokio::test]
async fn test_stream_first_frame_is_capped_snapshot() {
    let hub = Arc::new(EventHub::new(500, 64, Gauge::new()));
    for id in 1..=60 {
        hub.publish(record(id));
    }
    let settings = Arc::new(StreamSettings {
        default_limit: 100,
        max_limit: 500,
    });
    let app = super::events_routes()
        .layer(Extension(Arc::clone(&hub)))
        .layer(Extension(settings));

    let response = app
        .oneshot(
            Request::get("/events/stream?limit=50")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));

    // the snapshot frame must arrive without waiting for any publish
    let mut body = response.into_body().into_data_stream();
    let chunk = tokio::time::timeout(Duration::from_secs(1), body.next())
        .await
        .expect("snapshot frame should arrive immediately")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();
    let payload = text
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .expect("frame carries a data line");

    let items: serde_json::Value = serde_json::from_str(payload).unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 50);
    // newest first, truncated at the requested limit
    assert_eq!(items[0]["id"], 60);
    assert_eq!(items[49]["id"], 11);
}

#[test]
fn test_effective_limit_defaults_and_clamps() {
    let settings = StreamSettings {
        default_limit: 100,
        max_limit: 500,
    };
    assert_eq!(effective_limit(None, &settings), 100);
    assert_eq!(effective_limit(Some(42), &settings), 42);
    assert_eq!(effective_limit(Some(0), &settings), 1);
    assert_eq!(effective_limit(Some(9999), &settings), 500);
}
