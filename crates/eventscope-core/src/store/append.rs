use super::{parse_datetime, CoalesceSlot, EventStore};
use crate::error::{Error, Result};
use crate::event::{EventRecord, EventType, NewEvent};
use chrono::Utc;
use sqlx::Row;

/// What `append` did with the observation.
#[derive(Debug, Clone)]
pub enum AppendOutcome {
    /// A fresh row was written.
    Inserted(EventRecord),
    /// An existing row inside the window absorbed the repeat.
    Coalesced(EventRecord),
}

impl AppendOutcome {
    #[must_use]
    pub fn record(&self) -> &EventRecord {
        match self {
            Self::Inserted(r) | Self::Coalesced(r) => r,
        }
    }

    #[must_use]
    pub fn into_record(self) -> EventRecord {
        match self {
            Self::Inserted(r) | Self::Coalesced(r) => r,
        }
    }
}

impl EventStore {
    /// Insert or increment-in-place.
    ///
    /// The index lock is held across the decision and the write, so two
    /// writers racing on the same coalescing key cannot lose a count update.
    pub async fn append(&self, ev: &NewEvent) -> Result<AppendOutcome> {
        let key = ev.coalesce_key();
        let now = Utc::now();
        let mut index = self.index.lock().await;

        if let Some(slot) = index.get(&key) {
            if now.signed_duration_since(slot.last_seen) <= self.window {
                let id = slot.id;
                sqlx::query(
                    "UPDATE events SET count = count + 1, last_seen = ?1, source_cursor = ?2
                     WHERE id = ?3",
                )
                .bind(ev.last_seen.to_rfc3339())
                .bind(&ev.source_cursor)
                .bind(id)
                .execute(&self.pool)
                .await?;
                index.insert(key, CoalesceSlot { id, last_seen: now });
                let record = self
                    .get(id)
                    .await?
                    .ok_or_else(|| Error::Internal(format!("coalesced row {id} vanished")))?;
                return Ok(AppendOutcome::Coalesced(record));
            }
        }

        let record = self.insert_row(ev, now).await?;
        index.insert(key, CoalesceSlot { id: record.id, last_seen: now });
        Ok(AppendOutcome::Inserted(record))
    }

    /// Insert if absent, refresh without counting.
    ///
    /// Listing traffic (startup seed, resync) replays rows the store may
    /// already hold; a row matched by identity only gets `last_seen` and the
    /// cursor refreshed, never a `count` increment.
    pub async fn reconcile(&self, ev: &NewEvent) -> Result<EventRecord> {
        let key = ev.coalesce_key();
        let now = Utc::now();
        let mut index = self.index.lock().await;

        if let Some(slot) = index.get(&key) {
            if now.signed_duration_since(slot.last_seen) <= self.window {
                let id = slot.id;
                sqlx::query("UPDATE events SET last_seen = ?1, source_cursor = ?2 WHERE id = ?3")
                    .bind(ev.last_seen.to_rfc3339())
                    .bind(&ev.source_cursor)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                index.insert(key, CoalesceSlot { id, last_seen: now });
                return self
                    .get(id)
                    .await?
                    .ok_or_else(|| Error::Internal(format!("reconciled row {id} vanished")));
            }
        }

        let record = self.insert_row(ev, now).await?;
        index.insert(key, CoalesceSlot { id: record.id, last_seen: now });
        Ok(record)
    }

    async fn insert_row(&self, ev: &NewEvent, now: chrono::DateTime<Utc>) -> Result<EventRecord> {
        let result = sqlx::query(
            "INSERT INTO events
             (observed_at, event_type, reason, message, namespace,
              involved_kind, involved_name, count, first_seen, last_seen, source_cursor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9, ?10)",
        )
        .bind(now.to_rfc3339())
        .bind(ev.event_type.as_str())
        .bind(&ev.reason)
        .bind(&ev.message)
        .bind(&ev.namespace)
        .bind(&ev.involved_kind)
        .bind(&ev.involved_name)
        .bind(ev.first_seen.to_rfc3339())
        .bind(ev.last_seen.to_rfc3339())
        .bind(&ev.source_cursor)
        .execute(&self.pool)
        .await?;

        Ok(EventRecord {
            id: result.last_insert_rowid(),
            observed_at: now,
            event_type: ev.event_type,
            reason: ev.reason.clone(),
            message: ev.message.clone(),
            namespace: ev.namespace.clone(),
            involved_kind: ev.involved_kind.clone(),
            involved_name: ev.involved_name.clone(),
            count: 1,
            first_seen: ev.first_seen,
            last_seen: ev.last_seen,
            source_cursor: ev.source_cursor.clone(),
        })
    }

    /// Fetch a single record by id.
    pub async fn get(&self, id: i64) -> Result<Option<EventRecord>> {
        let row = sqlx::query(
            "SELECT id, observed_at, event_type, reason, message, namespace,
                    involved_kind, involved_name, count, first_seen, last_seen, source_cursor
             FROM events WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    pub(crate) fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<EventRecord> {
        let type_str: String = row.try_get("event_type")?;
        Ok(EventRecord {
            id: row.try_get("id")?,
            observed_at: parse_datetime(&row.try_get::<String, _>("observed_at")?),
            event_type: EventType::from_str_lossy(&type_str),
            reason: row.try_get("reason")?,
            message: row.try_get("message")?,
            namespace: row.try_get("namespace")?,
            involved_kind: row.try_get("involved_kind")?,
            involved_name: row.try_get("involved_name")?,
            count: row.try_get("count")?,
            first_seen: parse_datetime(&row.try_get::<String, _>("first_seen")?),
            last_seen: parse_datetime(&row.try_get::<String, _>("last_seen")?),
            source_cursor: row.try_get("source_cursor")?,
        })
    }
}
