//! Metrics collection for observability.
//!
//! Lightweight in-crate counters with Prometheus text exposition, no
//! external metrics dependency. [`IngestMetrics`] bundles the handles the
//! ingestion pipeline updates; the server wires it to the process-global
//! registry, tests build one from a fresh [`MetricsRegistry`].

pub mod labeled;
pub mod registry;
pub mod types;

pub use labeled::{format_labels, LabeledCounter};
pub use registry::MetricsRegistry;
pub use types::{Counter, Gauge};

use crate::event::EventType;

/// Counter handles for the ingestion pipeline.
///
/// A coalesced repeat is still an observation: it increments `events_total`
/// and the matching label series again, but never creates a new series.
#[derive(Clone)]
pub struct IngestMetrics {
    pub events_total: Counter,
    pub events_by_type: LabeledCounter,
    pub events_by_namespace: LabeledCounter,
    pub events_by_namespace_type: LabeledCounter,
    pub watcher_errors_total: Counter,
    pub watch_restarts_total: Counter,
    pub malformed_events_total: Counter,
    pub events_dropped_total: Counter,
}

impl IngestMetrics {
    /// Bind the pipeline counters to `registry` under their exposition names.
    #[must_use]
    pub fn from_registry(registry: &MetricsRegistry) -> Self {
        Self {
            events_total: registry.counter("events_total"),
            events_by_type: registry.labeled_counter("events_by_type"),
            events_by_namespace: registry.labeled_counter("events_by_namespace"),
            events_by_namespace_type: registry.labeled_counter("events_by_namespace_type"),
            watcher_errors_total: registry.counter("watcher_errors_total"),
            watch_restarts_total: registry.counter("watch_restarts_total"),
            malformed_events_total: registry.counter("malformed_events_total"),
            events_dropped_total: registry.counter("events_dropped_total"),
        }
    }

    /// Record one accepted observation (called after the coalesce decision).
    pub fn record_observation(&self, event_type: EventType, namespace: &str) {
        self.events_total.inc();
        self.events_by_type.inc(&[("type", event_type.as_str())]);
        self.events_by_namespace.inc(&[("namespace", namespace)]);
        self.events_by_namespace_type
            .inc(&[("namespace", namespace), ("type", event_type.as_str())]);
    }
}

/// Process-global registry backing the `/metrics` endpoint.
pub mod global {
    use super::MetricsRegistry;
    use std::sync::OnceLock;

    static REGISTRY: OnceLock<MetricsRegistry> = OnceLock::new();

    /// Get the global metrics registry.
    pub fn registry() -> &'static MetricsRegistry {
        REGISTRY.get_or_init(MetricsRegistry::new)
    }

    /// Export all metrics in Prometheus format.
    pub fn export_prometheus() -> String {
        registry().export_prometheus()
    }
}
