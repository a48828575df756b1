//! SQLite persistence with identity-keyed coalescing.
//!
//! The store owns the identity-to-last-row index the coalesce decision runs
//! against. The index mutex is held across decide-and-write, which serializes
//! appends per coalescing key; readers go straight to the pool (WAL mode).

use crate::error::{Error, Result};
use crate::event::CoalesceKey;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

mod append;
mod migrations;
mod query;
mod retry_queue;

#[cfg(test)]
mod tests;

pub use append::AppendOutcome;
pub use query::{SearchPage, SearchQuery, MAX_LATEST, MAX_PAGE_SIZE};
pub use retry_queue::RetryQueue;

/// Default coalescing window, matching the cluster's own event TTL.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_secs(3600);

pub(crate) struct CoalesceSlot {
    pub id: i64,
    pub last_seen: DateTime<Utc>,
}

/// SQLite-backed event store.
#[derive(Clone)]
pub struct EventStore {
    pub(crate) pool: SqlitePool,
    pub(crate) index: Arc<Mutex<HashMap<CoalesceKey, CoalesceSlot>>>,
    pub(crate) window: chrono::Duration,
}

impl EventStore {
    /// Open (or create) an event store at the given path.
    pub async fn from_path(db_path: &std::path::Path, window: Duration) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Internal(format!("mkdir: {e}")))?;
        }
        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        // Enable WAL so the watch session's writes never starve readers
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        let store = Self::with_pool(pool, window);
        store.run_migrations().await?;
        store.load_coalesce_index().await?;
        info!("Event store initialized at {}", db_path.display());
        Ok(store)
    }

    /// In-memory store (for tests).
    pub async fn in_memory() -> Result<Self> {
        Self::in_memory_with_window(DEFAULT_COALESCE_WINDOW).await
    }

    /// In-memory store with a custom coalescing window (for tests).
    pub async fn in_memory_with_window(window: Duration) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::with_pool(pool, window);
        store.run_migrations().await?;
        debug!("In-memory event store initialized");
        Ok(store)
    }

    fn with_pool(pool: SqlitePool, window: Duration) -> Self {
        Self {
            pool,
            index: Arc::new(Mutex::new(HashMap::new())),
            window: chrono::Duration::from_std(window)
                .unwrap_or_else(|_| chrono::Duration::max_value()),
        }
    }

    /// Cheap connectivity probe for the readiness endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Re-hydrate the coalesce index from rows still inside the window, so a
    /// restart does not split an ongoing repeat into a fresh row.
    async fn load_coalesce_index(&self) -> Result<()> {
        let cutoff = (Utc::now() - self.window).to_rfc3339();
        let rows = sqlx::query(
            "SELECT id, namespace, involved_kind, involved_name, reason, message, last_seen
             FROM events WHERE last_seen >= ?1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut index = self.index.lock().await;
        for row in &rows {
            let key = CoalesceKey {
                namespace: row.try_get("namespace")?,
                involved_kind: row.try_get("involved_kind")?,
                involved_name: row.try_get("involved_name")?,
                reason: row.try_get("reason")?,
                message: row.try_get("message")?,
            };
            let slot = CoalesceSlot {
                id: row.try_get("id")?,
                last_seen: parse_datetime(&row.try_get::<String, _>("last_seen")?),
            };
            // keep the most recent row per identity
            match index.get(&key) {
                Some(existing) if existing.last_seen >= slot.last_seen => {}
                _ => {
                    index.insert(key, slot);
                }
            }
        }
        debug!(entries = index.len(), "coalesce index loaded");
        Ok(())
    }
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
