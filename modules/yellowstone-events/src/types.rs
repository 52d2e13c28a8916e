//! Core types for the event log. Domain-agnostic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event as stored in SQLite. Returned by all read methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub client_token: String,
    pub committed_at: DateTime<Utc>,
}

/// An event to be appended. The caller builds this; the store assigns the id.
#[derive(Debug, Clone)]
pub struct AppendEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub client_token: String,
    pub committed_at: DateTime<Utc>,
}

impl AppendEvent {
    /// Stamp a new event with the current time. Projections read the same
    /// timestamp through their apply context, so the row and its effects agree.
    pub fn new(
        event_type: impl Into<String>,
        payload: serde_json::Value,
        client_token: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            client_token: client_token.into(),
            committed_at: Utc::now(),
        }
    }

    pub fn with_committed_at(mut self, committed_at: DateTime<Utc>) -> Self {
        self.committed_at = committed_at;
        self
    }
}
