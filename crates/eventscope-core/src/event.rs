//! Canonical event model.
//!
//! `NewEvent` is what the normalizer produces from a raw change; `EventRecord`
//! is what the store hands back once the new-vs-increment decision has been
//! made. Repeated observations sharing a [`CoalesceKey`] collapse into one
//! record with an incrementing `count`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a Kubernetes event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
    Error,
}

impl EventType {
    /// Parse a feed-supplied type string, mapping anything unknown to
    /// `Warning` (unknown severities are worth looking at, not dropping).
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "Normal" => Self::Normal,
            "Error" => Self::Error,
            _ => Self::Warning,
        }
    }

    /// Strict parse, used for query filters where a typo must not silently
    /// turn into a `Warning` filter.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Normal" => Some(Self::Normal),
            "Warning" => Some(Self::Warning),
            "Error" => Some(Self::Error),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
            Self::Error => "Error",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque resumption token into the change stream (the Kubernetes
/// `resourceVersion`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored event row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    /// Insertion instant; never changed by coalescing, so ordering is stable.
    pub observed_at: DateTime<Utc>,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
    pub namespace: String,
    pub involved_kind: String,
    pub involved_name: String,
    /// Number of observations collapsed into this row.
    pub count: i64,
    /// First observation; immutable once written.
    pub first_seen: DateTime<Utc>,
    /// Most recent observation; refreshed on every coalesced repeat.
    pub last_seen: DateTime<Utc>,
    /// Cursor the producing change carried, for debugging resume gaps.
    pub source_cursor: Option<String>,
}

/// A normalized observation awaiting persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
    pub namespace: String,
    pub involved_kind: String,
    pub involved_name: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub source_cursor: Option<String>,
}

impl NewEvent {
    /// Identity under which repeated observations coalesce.
    #[must_use]
    pub fn coalesce_key(&self) -> CoalesceKey {
        CoalesceKey {
            namespace: self.namespace.clone(),
            involved_kind: self.involved_kind.clone(),
            involved_name: self.involved_name.clone(),
            reason: self.reason.clone(),
            message: self.message.clone(),
        }
    }
}

/// Involved object identity plus reason and message: the coalescing identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoalesceKey {
    pub namespace: String,
    pub involved_kind: String,
    pub involved_name: String,
    pub reason: String,
    pub message: String,
}
