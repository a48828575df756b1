use super::EventStore;
use crate::backoff::{retry_with_backoff, BackoffPolicy};
use crate::event::NewEvent;
use crate::metrics::IngestMetrics;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Bounded retry path for records whose primary append failed.
///
/// Feed continuity outranks no-loss: once the queue is full or the attempts
/// are exhausted, the record is dropped and `events_dropped_total` counts
/// the loss.
#[derive(Clone)]
pub struct RetryQueue {
    tx: mpsc::Sender<NewEvent>,
    metrics: IngestMetrics,
}

impl RetryQueue {
    /// Spawn the retry worker and return the queue handle.
    pub fn spawn(
        store: EventStore,
        metrics: IngestMetrics,
        capacity: usize,
        max_attempts: u32,
        policy: BackoffPolicy,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<NewEvent>(capacity.max(1));
        let worker_metrics = metrics.clone();
        tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let result = retry_with_backoff(&policy, max_attempts, || {
                    let store = store.clone();
                    let ev = ev.clone();
                    async move { store.append(&ev).await }
                })
                .await;
                match result {
                    Ok(_) => debug!(
                        namespace = %ev.namespace,
                        reason = %ev.reason,
                        "queued record persisted after retry"
                    ),
                    Err(e) => {
                        worker_metrics.events_dropped_total.inc();
                        warn!(
                            namespace = %ev.namespace,
                            reason = %ev.reason,
                            error = %e,
                            "record dropped after exhausting retries"
                        );
                    }
                }
            }
        });
        Self { tx, metrics }
    }

    /// Hand off a record that failed the primary append. Never blocks; a full
    /// queue drops the record with a counted loss.
    pub fn enqueue(&self, ev: NewEvent) {
        if let Err(e) = self.tx.try_send(ev) {
            self.metrics.events_dropped_total.inc();
            warn!(error = %e, "retry queue saturated, record dropped");
        }
    }
}
