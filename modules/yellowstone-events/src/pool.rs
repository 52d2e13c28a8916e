//! SQLite connection pool setup.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::StoreError;

/// Open a pool for `database_url` (e.g. `sqlite:yellowstone.db` or `sqlite::memory:`).
///
/// File databases run in WAL mode with a busy timeout so a second writer waits
/// for the first instead of failing. In-memory databases live inside a single
/// connection, so they are pinned to one connection that is never recycled.
pub async fn open_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, StoreError> {
    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| StoreError::InvalidUrl(format!("{database_url}: {e}")))?
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    if !in_memory {
        options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?
    };

    info!(in_memory, max_connections, "SQLite pool opened");
    Ok(pool)
}
