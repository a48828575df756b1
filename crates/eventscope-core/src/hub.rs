//! Bounded per-subscriber fan-out with a shared recent-history ring.
//!
//! Delivery uses `try_send` on each subscriber's own bounded channel, so a
//! slow viewer can never stall the publisher: a saturated buffer disconnects
//! that subscriber only. The registry lock is scoped strictly to
//! register/unregister and sender snapshots, never held while sending.

use crate::event::EventRecord;
use crate::metrics::Gauge;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type SubscriberId = u64;

/// Bounded ring of the most recent records, deduplicated by row id so a
/// coalesced repeat replaces its earlier entry instead of appearing twice.
#[derive(Debug)]
pub struct RecentBuffer {
    inner: RwLock<VecDeque<EventRecord>>,
    capacity: usize,
}

impl RecentBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, record: EventRecord) {
        let mut buf = self.inner.write().unwrap_or_else(|e| e.into_inner());
        buf.retain(|r| r.id != record.id);
        buf.push_back(record);
        while buf.len() > self.capacity {
            buf.pop_front();
        }
    }

    /// Most-recent-first snapshot, at most `limit` records.
    #[must_use]
    pub fn snapshot(&self, limit: usize) -> Vec<EventRecord> {
        let buf = self.inner.read().unwrap_or_else(|e| e.into_inner());
        buf.iter().rev().take(limit).cloned().collect()
    }

    /// Replace the contents after a resync; `records` oldest-first.
    pub fn reseed(&self, records: Vec<EventRecord>) {
        let mut buf = self.inner.write().unwrap_or_else(|e| e.into_inner());
        buf.clear();
        let skip = records.len().saturating_sub(self.capacity);
        buf.extend(records.into_iter().skip(skip));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process publish/subscribe hub for live viewers.
pub struct EventHub {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<EventRecord>>>,
    recent: RecentBuffer,
    next_id: AtomicU64,
    subscriber_buffer: usize,
    subscribers_gauge: Gauge,
}

impl EventHub {
    /// `recent_capacity` bounds the history ring, `subscriber_buffer` the
    /// per-viewer delivery channel.
    #[must_use]
    pub fn new(recent_capacity: usize, subscriber_buffer: usize, subscribers_gauge: Gauge) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            recent: RecentBuffer::new(recent_capacity),
            next_id: AtomicU64::new(1),
            subscriber_buffer: subscriber_buffer.max(1),
            subscribers_gauge,
        }
    }

    /// Register a new viewer. Returns the subscription plus a most-recent-first
    /// snapshot of the history ring, so a new viewer is never blank.
    pub fn subscribe(self: &Arc<Self>) -> (Subscription, Vec<EventRecord>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.subscriber_buffer);
        {
            let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subs.insert(id, tx);
        }
        self.subscribers_gauge.inc();
        debug!(subscriber = id, "viewer subscribed");
        let snapshot = self.recent.snapshot(usize::MAX);
        (
            Subscription {
                id,
                rx,
                hub: Arc::clone(self),
            },
            snapshot,
        )
    }

    /// Remove a subscriber. Idempotent.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let removed = {
            let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subs.remove(&id)
        };
        if removed.is_some() {
            self.subscribers_gauge.dec();
            debug!(subscriber = id, "viewer unsubscribed");
        }
    }

    /// Refresh the history ring and deliver `record` to every subscriber.
    ///
    /// Never blocks on a slow subscriber: a full buffer disconnects that
    /// subscriber and the publish continues. Returns the delivered count.
    pub fn publish(&self, record: EventRecord) -> usize {
        self.recent.push(record.clone());

        let targets: Vec<(SubscriberId, mpsc::Sender<EventRecord>)> = {
            let subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subs.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let mut delivered = 0;
        let mut evict = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(record.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = id, "subscriber buffer saturated, disconnecting");
                    evict.push(id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => evict.push(id),
            }
        }
        for id in evict {
            self.unsubscribe(id);
        }
        delivered
    }

    /// Most-recent-first view of the history ring, at most `limit` records.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<EventRecord> {
        self.recent.snapshot(limit)
    }

    /// Replace the history ring after a resync; `records` oldest-first.
    pub fn reseed(&self, records: Vec<EventRecord>) {
        self.recent.reseed(records);
    }

    /// Capacity of the history ring.
    #[must_use]
    pub fn recent_capacity(&self) -> usize {
        self.recent.capacity
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// A live viewer's end of the hub; unregisters itself on drop.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<EventRecord>,
    hub: Arc<EventHub>,
}

impl Subscription {
    /// Next delivered record; `None` once disconnected (overflow or shutdown).
    pub async fn recv(&mut self) -> Option<EventRecord> {
        self.rx.recv().await
    }

    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
