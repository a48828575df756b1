//! Ingestion and distribution engine for Kubernetes events.
//!
//! The pipeline is a single producer driving fan-out:
//!
//! ```text
//! WatchSession ─ normalize ─▶ EventStore ─▶ IngestMetrics ─▶ EventHub ─▶ viewers
//! ```
//!
//! The watch session owns the resumable connection to the Kubernetes events
//! API, the store coalesces repeated observations into counted rows, and the
//! hub fans each stored record out to live SSE viewers over bounded
//! per-subscriber channels.

#![forbid(unsafe_code)]

pub mod backoff;
pub mod error;
pub mod event;
pub mod hub;
pub mod metrics;
pub mod normalizer;
pub mod store;
pub mod watcher;

pub use backoff::{retry_with_backoff, BackoffPolicy};
pub use error::{Error, Result};
pub use event::{CoalesceKey, Cursor, EventRecord, EventType, NewEvent};
pub use hub::{EventHub, Subscription};
pub use metrics::IngestMetrics;
pub use store::{AppendOutcome, EventStore, RetryQueue, SearchPage, SearchQuery};
pub use watcher::{
    ChangeKind, ConnectionPhase, FeedConfig, KubeFeed, RawChange, WatchFeed, WatchSession,
};
