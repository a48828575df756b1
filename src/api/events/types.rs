use chrono::{DateTime, Utc};
use eventscope_core::EventRecord;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for the latest-events listing
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct LatestQuery {
    /// Maximum number of results
    pub limit: Option<u32>,
}

/// Query parameters for historical search
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct SearchParams {
    /// Case-insensitive substring over reason/message/namespace/involved name
    pub q: Option<String>,
    /// Exact namespace filter
    pub namespace: Option<String>,
    /// Exact severity filter (Normal, Warning, Error)
    pub event_type: Option<String>,
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

pub(crate) fn default_page() -> u32 {
    1
}
pub(crate) fn default_page_size() -> u32 {
    20
}

/// Query parameters for the live stream
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct StreamQuery {
    /// Records per frame
    pub limit: Option<u32>,
}

/// Stream limits from configuration, shared with the SSE handler
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub default_limit: u32,
    pub max_limit: u32,
}

/// Event row as served by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventView {
    pub id: i64,
    pub observed_at: DateTime<Utc>,
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub namespace: String,
    pub involved_kind: String,
    pub involved_name: String,
    pub count: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl From<EventRecord> for EventView {
    fn from(record: EventRecord) -> Self {
        Self {
            id: record.id,
            observed_at: record.observed_at,
            event_type: record.event_type.as_str().to_string(),
            reason: record.reason,
            message: record.message,
            namespace: record.namespace,
            involved_kind: record.involved_kind,
            involved_name: record.involved_name,
            count: record.count,
            first_seen: record.first_seen,
            last_seen: record.last_seen,
        }
    }
}

/// One page of search results
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub items: Vec<EventView>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub pages: u32,
}
