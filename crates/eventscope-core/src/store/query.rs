use super::EventStore;
use crate::error::Result;
use crate::event::{EventRecord, EventType};
use sqlx::{QueryBuilder, Sqlite};

/// Upper bound on `page_size`.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Upper bound on the `latest` limit.
pub const MAX_LATEST: u32 = 500;

/// Historical search filter. Items and count run the identical predicate.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Case-insensitive substring over reason/message/namespace/involved_name.
    pub q: Option<String>,
    pub namespace: Option<String>,
    pub event_type: Option<EventType>,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

/// One page of results plus page metadata.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub items: Vec<EventRecord>,
    pub total: u64,
    pub page: u32,
    pub pages: u32,
    pub page_size: u32,
}

impl EventStore {
    /// Paginated search, ordered most-recent-first with id as tie-break.
    ///
    /// Under concurrent writes `total` and `items` may diverge by the write
    /// window; callers accept that eventual-consistency bound.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let page = query.page.max(1);
        let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);
        // widened before multiplying; the client controls `page`
        let offset = (i64::from(page) - 1) * i64::from(page_size);

        let mut count_query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM events WHERE 1=1");
        push_filters(&mut count_query, query);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        let total = total.max(0) as u64;

        let mut items_query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, observed_at, event_type, reason, message, namespace,
                    involved_kind, involved_name, count, first_seen, last_seen, source_cursor
             FROM events WHERE 1=1",
        );
        push_filters(&mut items_query, query);
        items_query.push(" ORDER BY observed_at DESC, id DESC LIMIT ");
        items_query.push_bind(page_size as i64);
        items_query.push(" OFFSET ");
        items_query.push_bind(offset);

        let rows = items_query.build().fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(Self::row_to_record)
            .collect::<Result<Vec<_>>>()?;

        let pages = (total as u32).div_ceil(page_size);

        Ok(SearchPage {
            items,
            total,
            page,
            pages,
            page_size,
        })
    }

    /// The `limit` most recent records, most-recent-first.
    pub async fn latest(&self, limit: u32) -> Result<Vec<EventRecord>> {
        let limit = limit.clamp(1, MAX_LATEST);
        let rows = sqlx::query(
            "SELECT id, observed_at, event_type, reason, message, namespace,
                    involved_kind, involved_name, count, first_seen, last_seen, source_cursor
             FROM events ORDER BY observed_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// Total number of stored rows.
    pub async fn event_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

fn push_filters(builder: &mut QueryBuilder<Sqlite>, query: &SearchQuery) {
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        let like = format!("%{}%", q.to_lowercase());
        builder.push(" AND (lower(reason) LIKE ");
        builder.push_bind(like.clone());
        builder.push(" OR lower(message) LIKE ");
        builder.push_bind(like.clone());
        builder.push(" OR lower(namespace) LIKE ");
        builder.push_bind(like.clone());
        builder.push(" OR lower(involved_name) LIKE ");
        builder.push_bind(like);
        builder.push(")");
    }
    if let Some(namespace) = &query.namespace {
        builder.push(" AND namespace = ");
        builder.push_bind(namespace.clone());
    }
    if let Some(event_type) = query.event_type {
        builder.push(" AND event_type = ");
        builder.push_bind(event_type.as_str());
    }
}
