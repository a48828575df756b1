//! Integration tests for Eventscope
//!
//! These tests verify the pieces of the ingestion pipeline working together:
//! store coalescing feeding hub fan-out, metrics exposition, and the retry
//! queue draining into the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eventscope_core::metrics::{Gauge, MetricsRegistry};
use eventscope_core::{
    AppendOutcome, BackoffPolicy, EventHub, EventStore, EventType, IngestMetrics, NewEvent,
    RetryQueue, SearchQuery,
};

fn observation(reason: &str, name: &str) -> NewEvent {
    NewEvent {
        event_type: EventType::Warning,
        reason: reason.to_string(),
        message: "observed".to_string(),
        namespace: "demo".to_string(),
        involved_kind: "Pod".to_string(),
        involved_name: name.to_string(),
        first_seen: Utc::now(),
        last_seen: Utc::now(),
        source_cursor: None,
    }
}

#[tokio::test]
async fn test_append_publish_subscribe_flow() {
    let store = EventStore::in_memory().await.unwrap();
    let hub = Arc::new(EventHub::new(100, 16, Gauge::new()));
    let (mut sub, snapshot) = hub.subscribe();
    assert!(snapshot.is_empty());

    // first observation inserts and reaches the live viewer
    let outcome = store.append(&observation("BackOff", "crashme")).await.unwrap();
    hub.publish(outcome.into_record());
    let seen = sub.recv().await.unwrap();
    assert_eq!(seen.count, 1);

    // the repeat coalesces; the viewer sees the same row with count 2
    let outcome = store.append(&observation("BackOff", "crashme")).await.unwrap();
    assert!(matches!(outcome, AppendOutcome::Coalesced(_)));
    hub.publish(outcome.into_record());
    let seen_again = sub.recv().await.unwrap();
    assert_eq!(seen_again.id, seen.id);
    assert_eq!(seen_again.count, 2);

    // and the history ring holds one entry, not two
    assert_eq!(hub.recent(10).len(), 1);
}

#[tokio::test]
async fn test_search_sees_coalesced_row() {
    let store = EventStore::in_memory().await.unwrap();
    for _ in 0..3 {
        store.append(&observation("BackOff", "crashme")).await.unwrap();
    }
    store.append(&observation("Pulled", "web-0")).await.unwrap();

    let page = store
        .search(&SearchQuery {
            q: Some("backoff".to_string()),
            page: 1,
            page_size: 20,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].count, 3);
}

#[tokio::test]
async fn test_metrics_exposition_after_observations() {
    let registry = MetricsRegistry::new();
    let metrics = IngestMetrics::from_registry(&registry);

    metrics.record_observation(EventType::Warning, "demo");
    metrics.record_observation(EventType::Warning, "demo");
    metrics.record_observation(EventType::Normal, "prod");

    let text = registry.export_prometheus();
    assert!(text.contains("events_total 3"));
    assert!(text.contains("events_by_type{type=\"Warning\"} 2"));
    assert!(text.contains("events_by_namespace{namespace=\"prod\"} 1"));
}

#[tokio::test]
async fn test_retry_queue_drains_into_store() {
    let store = EventStore::in_memory().await.unwrap();
    let registry = MetricsRegistry::new();
    let metrics = IngestMetrics::from_registry(&registry);
    let queue = RetryQueue::spawn(
        store.clone(),
        metrics,
        8,
        3,
        BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(2)),
    );

    queue.enqueue(observation("FailedMount", "web-1"));

    for _ in 0..100 {
        if store.event_count().await.unwrap() == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queued observation never reached the store");
}
