use super::EventStore;
use crate::error::Result;

impl EventStore {
    pub(crate) async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS events (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                observed_at   TEXT NOT NULL,
                event_type    TEXT NOT NULL,
                reason        TEXT NOT NULL,
                message       TEXT NOT NULL,
                namespace     TEXT NOT NULL,
                involved_kind TEXT NOT NULL,
                involved_name TEXT NOT NULL,
                count         INTEGER NOT NULL DEFAULT 1,
                first_seen    TEXT NOT NULL,
                last_seen     TEXT NOT NULL,
                source_cursor TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        // covers the search predicate and its ordering
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_ns_type_observed
             ON events(namespace, event_type, observed_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_observed ON events(observed_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_last_seen ON events(last_seen)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
