//! Projection tables. Derived from the event log and safe to drop and rebuild.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

const TASK_LIST_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS task_list_v1 (
    id       INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    title    TEXT    NOT NULL,
    category TEXT    NOT NULL,
    archived BOOLEAN NOT NULL,
    position INTEGER NOT NULL
)
"#;

const TASK_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS task_v1 (
    id           INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    title        TEXT NOT NULL,
    due_date     TEXT,
    completed_at TEXT
)
"#;

const TASK_TO_LIST_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS task_to_list_v1 (
    task_id  INTEGER NOT NULL REFERENCES task_v1(id) ON DELETE CASCADE,
    list_id  INTEGER NOT NULL REFERENCES task_list_v1(id),
    position INTEGER NOT NULL,
    PRIMARY KEY (task_id, list_id)
)
"#;

// History outlives its task: the delete entry is written after the row is gone.
const TASK_HISTORY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS task_history_v1 (
    id             INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    task_id        INTEGER NOT NULL,
    update_type    TEXT    NOT NULL,
    system_comment TEXT    NOT NULL,
    user_comment   TEXT,
    created_at     TEXT    NOT NULL
)
"#;

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS task_to_list_v1_list ON task_to_list_v1 (list_id, position)",
    "CREATE INDEX IF NOT EXISTS task_history_v1_task ON task_history_v1 (task_id, created_at)",
];

/// Projection tables in creation order. Dropped in reverse.
pub const PROJECTION_TABLES: &[&str] = &["task_list_v1", "task_v1", "task_to_list_v1", "task_history_v1"];

/// Create the projection tables if they do not exist. Idempotent.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for ddl in [TASK_LIST_SCHEMA, TASK_SCHEMA, TASK_TO_LIST_SCHEMA, TASK_HISTORY_SCHEMA] {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }
    for ddl in INDEXES {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Drop and recreate every projection table. The event log is untouched.
///
/// Dropping an `AUTOINCREMENT` table also clears its sequence, so a replay
/// that follows assigns the same entity ids as the live run did.
pub async fn reset(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for table in PROJECTION_TABLES.iter().rev() {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(tables = PROJECTION_TABLES.len(), "Projection tables dropped");
    migrate(pool).await
}
