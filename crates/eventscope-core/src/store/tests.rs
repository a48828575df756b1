use super::*;
use crate::backoff::BackoffPolicy;
use crate::event::{EventType, NewEvent};
use crate::metrics::{IngestMetrics, MetricsRegistry};
use std::collections::HashSet;
use std::time::Duration;

async fn test_store() -> EventStore {
    EventStore::in_memory().await.unwrap()
}

fn make_event(reason: &str, name: &str) -> NewEvent {
    NewEvent {
        event_type: EventType::Warning,
        reason: reason.into(),
        message: "pod crash".into(),
        namespace: "demo".into(),
        involved_kind: "Pod".into(),
        involved_name: name.into(),
        first_seen: Utc::now(),
        last_seen: Utc::now(),
        source_cursor: Some("1".into()),
    }
}

#[tokio::test]
async fn test_insert_then_get() {
    let store = test_store().await;
    let outcome = store.append(&make_event("BackOff", "crashme")).await.unwrap();
    let record = outcome.into_record();
    assert_eq!(record.count, 1);

    let got = store.get(record.id).await.unwrap().unwrap();
    assert_eq!(got.reason, "BackOff");
    assert_eq!(got.namespace, "demo");
    assert_eq!(got.count, 1);
}

#[tokio::test]
async fn test_identical_repeat_coalesces_into_one_row() {
    let store = test_store().await;
    let ev = make_event("BackOff", "crashme");

    let first = store.append(&ev).await.unwrap();
    assert!(matches!(first, AppendOutcome::Inserted(_)));

    let mut repeat = ev.clone();
    repeat.last_seen = Utc::now();
    let second = store.append(&repeat).await.unwrap();

    match second {
        AppendOutcome::Coalesced(record) => {
            assert_eq!(record.id, first.record().id);
            assert_eq!(record.count, 2);
        }
        AppendOutcome::Inserted(_) => panic!("repeat must coalesce, not insert"),
    }
    assert_eq!(store.event_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_reconcile_refreshes_without_counting() {
    let store = test_store().await;
    let ev = make_event("BackOff", "crashme");
    let first = store.reconcile(&ev).await.unwrap();
    assert_eq!(first.count, 1);

    let mut relisted = ev.clone();
    relisted.last_seen = Utc::now() + chrono::Duration::seconds(5);
    relisted.source_cursor = Some("2".into());
    let again = store.reconcile(&relisted).await.unwrap();

    assert_eq!(again.id, first.id);
    assert_eq!(again.count, 1);
    assert!(again.last_seen > first.last_seen);
    assert_eq!(again.source_cursor.as_deref(), Some("2"));
    assert_eq!(store.event_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_append_after_reconcile_still_coalesces() {
    let store = test_store().await;
    let ev = make_event("BackOff", "crashme");
    let seeded = store.reconcile(&ev).await.unwrap();

    let mut live = ev.clone();
    live.last_seen = Utc::now();
    let outcome = store.append(&live).await.unwrap();

    match outcome {
        AppendOutcome::Coalesced(record) => {
            assert_eq!(record.id, seeded.id);
            assert_eq!(record.count, 2);
        }
        AppendOutcome::Inserted(_) => panic!("live repeat of a seeded row must coalesce"),
    }
}

#[tokio::test]
async fn test_first_seen_immutable_on_coalesce() {
    let store = test_store().await;
    let ev = make_event("BackOff", "crashme");
    let first = store.append(&ev).await.unwrap().into_record();

    let mut repeat = ev.clone();
    repeat.first_seen = Utc::now() + chrono::Duration::hours(1);
    repeat.last_seen = repeat.first_seen;
    let record = store.append(&repeat).await.unwrap().into_record();

    assert_eq!(record.first_seen, first.first_seen);
    assert!(record.last_seen > first.last_seen);
}

#[tokio::test]
async fn test_different_identity_gets_own_row() {
    let store = test_store().await;
    store.append(&make_event("BackOff", "crashme")).await.unwrap();
    store.append(&make_event("BackOff", "other")).await.unwrap();
    store.append(&make_event("Killing", "crashme")).await.unwrap();
    assert_eq!(store.event_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_expired_window_starts_new_row() {
    let store = EventStore::in_memory_with_window(Duration::ZERO).await.unwrap();
    let ev = make_event("BackOff", "crashme");
    store.append(&ev).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let outcome = store.append(&ev).await.unwrap();
    assert!(matches!(outcome, AppendOutcome::Inserted(_)));
    assert_eq!(store.event_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_latest_orders_most_recent_first() {
    let store = test_store().await;
    for i in 0..5 {
        store.append(&make_event("Pulled", &format!("pod-{i}"))).await.unwrap();
    }
    let latest = store.latest(3).await.unwrap();
    assert_eq!(latest.len(), 3);
    assert!(latest[0].id > latest[1].id);
    assert!(latest[1].id > latest[2].id);
    assert_eq!(latest[0].involved_name, "pod-4");
}

#[tokio::test]
async fn test_search_substring_is_case_insensitive() {
    let store = test_store().await;
    store.append(&make_event("BackOff", "crashme")).await.unwrap();
    store.append(&make_event("Pulled", "web-0")).await.unwrap();

    let page = store
        .search(&SearchQuery {
            q: Some("BACKOFF".into()),
            page: 1,
            page_size: 20,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].reason, "BackOff");
}

#[tokio::test]
async fn test_search_filters_namespace_and_type() {
    let store = test_store().await;
    let mut normal = make_event("Scheduled", "web-0");
    normal.event_type = EventType::Normal;
    normal.namespace = "prod".into();
    store.append(&normal).await.unwrap();
    store.append(&make_event("BackOff", "crashme")).await.unwrap();

    let page = store
        .search(&SearchQuery {
            namespace: Some("prod".into()),
            event_type: Some(EventType::Normal),
            page: 1,
            page_size: 20,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].namespace, "prod");
}

#[tokio::test]
async fn test_page_concatenation_reproduces_full_set() {
    let store = test_store().await;
    for i in 0..23 {
        store.append(&make_event("Pulled", &format!("pod-{i}"))).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut page = 1;
    loop {
        let result = store
            .search(&SearchQuery {
                page,
                page_size: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.total, 23);
        assert_eq!(result.pages, 5);
        if result.items.is_empty() {
            break;
        }
        seen.extend(result.items.iter().map(|r| r.id));
        if page >= result.pages {
            break;
        }
        page += 1;
    }

    assert_eq!(seen.len(), 23);
    let unique: HashSet<i64> = seen.iter().copied().collect();
    assert_eq!(unique.len(), 23, "no duplicate ids across pages");
    let mut sorted = seen.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(seen, sorted, "concatenated pages stay ordered");
}

#[tokio::test]
async fn test_page_size_clamped() {
    let store = test_store().await;
    store.append(&make_event("Pulled", "web-0")).await.unwrap();
    let page = store
        .search(&SearchQuery {
            page: 1,
            page_size: 10_000,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.page_size, MAX_PAGE_SIZE);
}

#[tokio::test]
async fn test_huge_page_number_returns_empty_page() {
    let store = test_store().await;
    store.append(&make_event("Pulled", "web-0")).await.unwrap();
    let page = store
        .search(&SearchQuery {
            page: u32::MAX,
            page_size: 200,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_empty_page_beyond_end() {
    let store = test_store().await;
    store.append(&make_event("Pulled", "web-0")).await.unwrap();
    let page = store
        .search(&SearchQuery {
            page: 9,
            page_size: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_coalesce_index_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.db");

    let ev = make_event("BackOff", "crashme");
    {
        let store = EventStore::from_path(&path, DEFAULT_COALESCE_WINDOW).await.unwrap();
        store.append(&ev).await.unwrap();
    }

    let store = EventStore::from_path(&path, DEFAULT_COALESCE_WINDOW).await.unwrap();
    let outcome = store.append(&ev).await.unwrap();
    assert!(matches!(outcome, AppendOutcome::Coalesced(_)));
    assert_eq!(store.event_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_retry_queue_drops_when_store_unavailable() {
    let store = test_store().await;
    let registry = MetricsRegistry::new();
    let metrics = IngestMetrics::from_registry(&registry);

    // closing the pool makes every append fail
    store.pool.close().await;

    let queue = RetryQueue::spawn(
        store,
        metrics.clone(),
        8,
        2,
        BackoffPolicy {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(2),
            multiplier: 2.0,
            jitter: false,
        },
    );
    queue.enqueue(make_event("BackOff", "crashme"));

    // bounded retries then a counted drop
    for _ in 0..100 {
        if metrics.events_dropped_total.get() == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("record was not dropped after retries");
}

#[tokio::test]
async fn test_retry_queue_persists_on_recovery() {
    let store = test_store().await;
    let registry = MetricsRegistry::new();
    let metrics = IngestMetrics::from_registry(&registry);

    let queue = RetryQueue::spawn(
        store.clone(),
        metrics.clone(),
        8,
        3,
        BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(2)),
    );
    queue.enqueue(make_event("BackOff", "crashme"));

    for _ in 0..100 {
        if store.event_count().await.unwrap() == 1 {
            assert_eq!(metrics.events_dropped_total.get(), 0);
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queued record never persisted");
}
