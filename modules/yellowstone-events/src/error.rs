use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Another event already committed with this idempotency token.
    #[error("Client token already used: {0}")]
    DuplicateClientToken(String),

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),
}

impl StoreError {
    /// Wrap a sqlx error, recognising a uniqueness violation on the token column.
    pub(crate) fn from_append(err: sqlx::Error, client_token: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::DuplicateClientToken(client_token.to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}
