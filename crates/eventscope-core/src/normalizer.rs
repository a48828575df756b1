//! Raw change to [`NewEvent`] normalization.
//!
//! Kubernetes delivers events in two shapes (core/v1 with `firstTimestamp`
//! and `lastTimestamp`, events.k8s.io with `eventTime`); this module folds
//! both into the canonical model and rejects objects missing the fields the
//! coalescing identity is built from.

use crate::error::{Error, Result};
use crate::event::{EventType, NewEvent};

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Normalize a raw event object from the feed.
///
/// Fails with [`Error::Malformed`] when the involved-object identity or the
/// reason is missing; everything else degrades to a sensible default.
pub fn normalize(object: &Value) -> Result<NewEvent> {
    let involved = object.get("involvedObject");

    let namespace = involved
        .and_then(|o| str_field(o, "namespace"))
        .or_else(|| object.get("metadata").and_then(|m| str_field(m, "namespace")))
        .ok_or_else(|| malformed(object, "namespace"))?;
    let involved_kind = involved
        .and_then(|o| str_field(o, "kind"))
        .ok_or_else(|| malformed(object, "involvedObject.kind"))?;
    let involved_name = involved
        .and_then(|o| str_field(o, "name"))
        .ok_or_else(|| malformed(object, "involvedObject.name"))?;
    let reason = str_field(object, "reason").ok_or_else(|| malformed(object, "reason"))?;

    let message = str_field(object, "message").unwrap_or_default();
    let event_type = match object.get("type").and_then(Value::as_str) {
        Some(s) => EventType::from_str_lossy(s),
        None => EventType::Normal,
    };

    let event_time = time_field(object, "eventTime");
    let first_seen = time_field(object, "firstTimestamp")
        .or(event_time)
        .unwrap_or_else(Utc::now);
    let last_seen = time_field(object, "lastTimestamp")
        .or(event_time)
        .unwrap_or(first_seen);

    let source_cursor = object
        .get("metadata")
        .and_then(|m| str_field(m, "resourceVersion"));

    Ok(NewEvent {
        event_type,
        reason,
        message,
        namespace,
        involved_kind,
        involved_name,
        first_seen,
        last_seen,
        source_cursor,
    })
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn time_field(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn malformed(object: &Value, field: &str) -> Error {
    let name = object
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>");
    Error::Malformed(format!("event {name}: missing {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_event() -> Value {
        json!({
            "metadata": {"name": "crashme.17a", "namespace": "demo", "resourceVersion": "4242"},
            "involvedObject": {"kind": "Pod", "name": "crashme", "namespace": "demo"},
            "reason": "BackOff",
            "message": "Back-off restarting failed container",
            "type": "Warning",
            "firstTimestamp": "2026-08-29T10:00:00Z",
            "lastTimestamp": "2026-08-29T10:05:00Z"
        })
    }

    #[test]
    fn test_normalizes_core_v1_event() {
        let ev = normalize(&full_event()).unwrap();
        assert_eq!(ev.event_type, EventType::Warning);
        assert_eq!(ev.reason, "BackOff");
        assert_eq!(ev.namespace, "demo");
        assert_eq!(ev.involved_kind, "Pod");
        assert_eq!(ev.involved_name, "crashme");
        assert_eq!(ev.source_cursor.as_deref(), Some("4242"));
        assert!(ev.last_seen > ev.first_seen);
    }

    #[test]
    fn test_missing_reason_is_malformed() {
        let mut obj = full_event();
        obj.as_object_mut().unwrap().remove("reason");
        let err = normalize(&obj).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
        assert!(err.to_string().contains("reason"));
    }

    #[test]
    fn test_missing_involved_identity_is_malformed() {
        let mut obj = full_event();
        obj["involvedObject"].as_object_mut().unwrap().remove("name");
        assert!(matches!(normalize(&obj), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_namespace_falls_back_to_metadata() {
        let mut obj = full_event();
        obj["involvedObject"].as_object_mut().unwrap().remove("namespace");
        let ev = normalize(&obj).unwrap();
        assert_eq!(ev.namespace, "demo");
    }

    #[test]
    fn test_event_time_shape() {
        let obj = json!({
            "metadata": {"name": "web-0.17b", "namespace": "demo"},
            "involvedObject": {"kind": "Pod", "name": "web-0", "namespace": "demo"},
            "reason": "Scheduled",
            "type": "Normal",
            "eventTime": "2026-08-29T11:00:00Z"
        });
        let ev = normalize(&obj).unwrap();
        assert_eq!(ev.event_type, EventType::Normal);
        assert_eq!(ev.message, "");
        assert_eq!(ev.first_seen, ev.last_seen);
        assert_eq!(ev.first_seen.to_rfc3339(), "2026-08-29T11:00:00+00:00");
        assert_eq!(ev.source_cursor, None);
    }

    #[test]
    fn test_missing_type_defaults_to_normal() {
        let mut obj = full_event();
        obj.as_object_mut().unwrap().remove("type");
        assert_eq!(normalize(&obj).unwrap().event_type, EventType::Normal);
    }
}
