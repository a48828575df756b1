//! Resumable watch session driving the ingestion pipeline.
//!
//! One session owns the connection lifecycle:
//!
//! ```text
//! Connecting ──▶ Streaming ──▶ Backoff ──▶ Connecting        (transient)
//!                    │
//!                    └────▶ Resyncing ──▶ Connecting         (stale cursor)
//! ```
//!
//! A stale cursor means the server no longer holds our resume point, so the
//! session re-lists immediately instead of backing off; the store's
//! coalescing absorbs anything the relist repeats.

mod feed;

pub use feed::{ChangeKind, FeedConfig, KubeFeed, RawChange, RawChangeStream, WatchFeed};

use crate::backoff::BackoffPolicy;
use crate::error::{Error, Result};
use crate::event::Cursor;
use crate::hub::EventHub;
use crate::metrics::IngestMetrics;
use crate::normalizer;
use crate::store::{EventStore, RetryQueue};

use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle phase of the watch session, published for the health endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Connecting,
    Streaming,
    Backoff,
    Resyncing,
    Stopped,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Backoff => "backoff",
            Self::Resyncing => "resyncing",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

enum LoopOutcome {
    Shutdown,
    Transient,
    Resync,
}

/// The single producer of the pipeline: consumes the feed, persists through
/// the store, publishes stored records to the hub.
pub struct WatchSession {
    feed: Arc<dyn WatchFeed>,
    store: EventStore,
    hub: Arc<EventHub>,
    metrics: IngestMetrics,
    retry: RetryQueue,
    backoff: BackoffPolicy,
    cursor: Option<Cursor>,
    phase_tx: watch::Sender<ConnectionPhase>,
    backoff_attempt: u32,
}

impl WatchSession {
    /// Build a session and the receiver health checks observe the phase on.
    pub fn new(
        feed: Arc<dyn WatchFeed>,
        store: EventStore,
        hub: Arc<EventHub>,
        metrics: IngestMetrics,
        retry: RetryQueue,
        backoff: BackoffPolicy,
    ) -> (Self, watch::Receiver<ConnectionPhase>) {
        let (phase_tx, phase_rx) = watch::channel(ConnectionPhase::Connecting);
        (
            Self {
                feed,
                store,
                hub,
                metrics,
                retry,
                backoff,
                cursor: None,
                phase_tx,
                backoff_attempt: 0,
            },
            phase_rx,
        )
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        self.phase_tx.send_replace(phase);
    }

    /// List the current events, persist them, and prime the hub's history
    /// ring. Sets the resume cursor. Seed observations are not live traffic,
    /// so the per-event metrics stay untouched, nothing is published, and
    /// rows the store already holds are refreshed rather than re-counted.
    pub async fn seed(&mut self) -> Result<()> {
        let (items, cursor) = self.feed.list().await?;
        let mut stored = 0usize;
        for object in &items {
            match normalizer::normalize(object) {
                Ok(event) => {
                    self.store.reconcile(&event).await?;
                    stored += 1;
                }
                Err(e) => debug!(error = %e, "skipping malformed listing entry"),
            }
        }

        let limit = u32::try_from(self.hub.recent_capacity()).unwrap_or(u32::MAX);
        let mut recent = self.store.latest(limit).await?;
        recent.reverse();
        self.hub.reseed(recent);

        info!(listed = items.len(), stored, cursor = %cursor, "seeded from listing");
        self.cursor = Some(cursor);
        Ok(())
    }

    /// Initial seed with a startup grace window. Retries transient failures
    /// until `grace` elapses, then gives up so the process can exit non-zero
    /// instead of serving an empty store it could never fill.
    pub async fn seed_with_grace(&mut self, grace: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + grace;
        let mut attempt = 1u32;
        loop {
            match self.seed().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && tokio::time::Instant::now() < deadline => {
                    let delay = self.backoff.delay_for(attempt);
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64,
                        "initial listing failed, retrying within grace window");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drive the watch loop until `shutdown` fires. Consumes the session;
    /// the phase receiver keeps reporting after the loop ends.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            self.set_phase(ConnectionPhase::Connecting);
            match self.connect_and_stream(&shutdown).await {
                LoopOutcome::Shutdown => break,
                LoopOutcome::Resync => {
                    // the server dropped our resume point; relist, no backoff
                    self.set_phase(ConnectionPhase::Resyncing);
                    self.metrics.watcher_errors_total.inc();
                    self.cursor = None;
                    self.backoff_attempt = 0;
                    if let Err(e) = self.seed().await {
                        warn!(error = %e, "resync listing failed");
                        if self.wait_backoff(&shutdown).await {
                            break;
                        }
                    }
                }
                LoopOutcome::Transient => {
                    self.metrics.watch_restarts_total.inc();
                    if self.wait_backoff(&shutdown).await {
                        break;
                    }
                }
            }
        }
        self.set_phase(ConnectionPhase::Stopped);
        info!("watch session stopped");
    }

    /// Sleep out one backoff step. Returns true when shutdown fired.
    async fn wait_backoff(&mut self, shutdown: &CancellationToken) -> bool {
        self.backoff_attempt += 1;
        let delay = self.backoff.delay_for(self.backoff_attempt);
        self.set_phase(ConnectionPhase::Backoff);
        debug!(attempt = self.backoff_attempt, delay_ms = delay.as_millis() as u64, "backing off");
        tokio::select! {
            () = shutdown.cancelled() => true,
            () = tokio::time::sleep(delay) => false,
        }
    }

    async fn connect_and_stream(&mut self, shutdown: &CancellationToken) -> LoopOutcome {
        let mut stream = match self.feed.open(self.cursor.as_ref()).await {
            Ok(stream) => stream,
            Err(Error::StaleCursor) => return LoopOutcome::Resync,
            Err(e) => {
                warn!(error = %e, "watch connect failed");
                self.metrics.watcher_errors_total.inc();
                return LoopOutcome::Transient;
            }
        };

        self.set_phase(ConnectionPhase::Streaming);
        self.backoff_attempt = 0;
        debug!(cursor = ?self.cursor.as_ref().map(Cursor::as_str), "watch stream open");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => return LoopOutcome::Shutdown,
                next = stream.next() => match next {
                    Some(Ok(change)) => self.handle_change(change).await,
                    Some(Err(Error::StaleCursor)) => return LoopOutcome::Resync,
                    Some(Err(e)) => {
                        warn!(error = %e, "watch stream failed");
                        self.metrics.watcher_errors_total.inc();
                        return LoopOutcome::Transient;
                    }
                    None => {
                        debug!("watch stream ended cleanly");
                        return LoopOutcome::Transient;
                    }
                },
            }
        }
    }

    /// One change: advance the cursor, normalize, persist, count, publish.
    /// Publication happens only after a successful append, so a viewer never
    /// sees a record the store does not hold.
    async fn handle_change(&mut self, change: RawChange) {
        if let Some(cursor) = change
            .object
            .get("metadata")
            .and_then(|m| m.get("resourceVersion"))
            .and_then(Value::as_str)
        {
            self.cursor = Some(Cursor::new(cursor));
        }
        if change.kind == ChangeKind::Bookmark {
            return;
        }

        let event = match normalizer::normalize(&change.object) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropping malformed change");
                self.metrics.malformed_events_total.inc();
                return;
            }
        };

        match self.store.append(&event).await {
            Ok(outcome) => {
                let record = outcome.into_record();
                self.metrics.record_observation(record.event_type, &record.namespace);
                self.hub.publish(record);
            }
            Err(e) => {
                warn!(error = %e, "append failed, queueing for retry");
                self.retry.enqueue(event);
            }
        }
    }
}
