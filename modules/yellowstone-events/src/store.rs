//! EventStore: append-only event log backed by SQLite.
//!
//! Ids come from an `AUTOINCREMENT` primary key: never reused, and because a
//! rolled-back insert also rolls back the sequence, committed ids are gap-free
//! under the store's single writer.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::StoreError;
use crate::types::{AppendEvent, StoredEvent};

const EVENTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id           INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    event_type   TEXT    NOT NULL,
    payload      TEXT    NOT NULL,
    client_token TEXT    NOT NULL UNIQUE,
    committed_at TEXT    NOT NULL
)
"#;

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

/// Append-only event log. The single source of truth.
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the events table if it does not exist. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(EVENTS_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Append inside the caller's transaction. The row becomes visible (and its
    /// id final) only when that transaction commits.
    ///
    /// A reused client token fails with [`StoreError::DuplicateClientToken`].
    pub async fn append_in(
        conn: &mut SqliteConnection,
        event: &AppendEvent,
    ) -> Result<StoredEvent, StoreError> {
        let payload = serde_json::to_string(&event.payload)?;

        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO events (event_type, payload, client_token, committed_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(&event.event_type)
        .bind(&payload)
        .bind(&event.client_token)
        .bind(event.committed_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| StoreError::from_append(e, &event.client_token))?;

        debug!(id = row.0, event_type = %event.event_type, "Event appended");

        Ok(StoredEvent {
            id: row.0,
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            client_token: event.client_token.clone(),
            committed_at: event.committed_at,
        })
    }

    /// Append and commit in a transaction of its own. For records with no
    /// projection side effects.
    pub async fn append(&self, event: &AppendEvent) -> Result<StoredEvent, StoreError> {
        let mut tx = self.pool.begin().await?;
        let stored = Self::append_in(&mut *tx, event).await?;
        tx.commit().await?;
        Ok(stored)
    }

    /// The id committed under `client_token`, if any.
    pub async fn find_by_client_token(&self, client_token: &str) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT id FROM events WHERE client_token = ?1")
            .bind(client_token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.0))
    }

    /// Read a single event by id.
    pub async fn read_event(&self, id: i64) -> Result<Option<StoredEvent>, StoreError> {
        let row = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT id, event_type, payload, client_token, committed_at
            FROM events
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Read events in id order starting from `id_start` (inclusive).
    pub async fn read_from(&self, id_start: i64, limit: usize) -> Result<Vec<StoredEvent>, StoreError> {
        let rows = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT id, event_type, payload, client_token, committed_at
            FROM events
            WHERE id >= ?1
            ORDER BY id ASC
            LIMIT ?2
            "#,
        )
        .bind(id_start)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Read events of one type, in id order.
    pub async fn read_by_type(
        &self,
        event_type: &str,
        id_start: i64,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let rows = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT id, event_type, payload, client_token, committed_at
            FROM events
            WHERE event_type = ?1 AND id >= ?2
            ORDER BY id ASC
            LIMIT ?3
            "#,
        )
        .bind(event_type)
        .bind(id_start)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// The latest committed id, or 0 if the log is empty.
    pub async fn latest_id(&self) -> Result<i64, StoreError> {
        let row = sqlx::query_as::<_, (Option<i64>,)>("SELECT MAX(id) FROM events")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0.unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// sqlx::FromRow for StoredEvent
// ---------------------------------------------------------------------------

impl<'r> sqlx::FromRow<'r, SqliteRow> for StoredEvent {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let payload: String = row.try_get("payload")?;
        Ok(StoredEvent {
            id: row.try_get("id")?,
            event_type: row.try_get("event_type")?,
            payload: serde_json::from_str(&payload).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            client_token: row.try_get("client_token")?,
            committed_at: row.try_get("committed_at")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Test utilities
// ---------------------------------------------------------------------------

#[cfg(feature = "test-utils")]
impl EventStore {
    /// Read the whole log (for tests).
    pub async fn read_all(&self) -> Result<Vec<StoredEvent>, StoreError> {
        self.read_from(0, usize::MAX >> 1).await
    }

    /// Number of committed events (for tests).
    pub async fn count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
