use thiserror::Error;
use yellowstone_events::StoreError;

/// Why a publish or replay did not commit. Every variant means the
/// transaction was rolled back in full.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Malformed event envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Missing client token")]
    MissingClientToken,

    /// The type is known but the payload does not match its shape.
    #[error("Failed to decode {event_type}: {source}")]
    Decode {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Projection {projection} failed on {event_type}: {source:#}")]
    Handler {
        projection: &'static str,
        event_type: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Follow-up chain exceeded {0} events")]
    FollowUpOverflow(usize),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl DispatchError {
    /// Caller errors: retrying the same request will fail the same way.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DispatchError::MalformedEnvelope(_)
                | DispatchError::MissingClientToken
                | DispatchError::Decode { .. }
        )
    }
}

impl From<sqlx::Error> for DispatchError {
    fn from(err: sqlx::Error) -> Self {
        DispatchError::Storage(StoreError::Database(err))
    }
}
