//! Core traits for the dispatch engine.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

/// A closed set of typed events, tagged by a namespaced type string.
pub trait EventLike: Clone + Send + Sync + 'static {
    /// The type string stored in the `event_type` column, e.g. `"Task:Add"`.
    fn event_type_str(&self) -> &'static str;

    /// Decode a JSON envelope declared as `event_type`.
    ///
    /// Returns `None` when the type is not one this domain knows; such events
    /// are logged but never projected. `Some(Err(_))` means the type is known
    /// but the payload does not fit its shape.
    fn decode(event_type: &str, envelope: &serde_json::Value) -> Option<Result<Self, serde_json::Error>>;
}

/// Result of applying one event to one projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// The event produced a mutation.
    Applied,
    /// The projection does not handle this event, or there was nothing to change.
    NoOp,
}

/// Per-event context handed to projections.
///
/// Carries the event's commit timestamp (projections never read the wall
/// clock, so replay reproduces identical rows) and collects follow-up events.
pub struct ApplyContext<E> {
    committed_at: DateTime<Utc>,
    follow_ups: Vec<E>,
}

impl<E> ApplyContext<E> {
    pub fn new(committed_at: DateTime<Utc>) -> Self {
        Self {
            committed_at,
            follow_ups: Vec::new(),
        }
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }

    /// Queue a follow-up event. It is applied through its own registered
    /// projections inside the same transaction, under the same commit, and is
    /// never appended to the log as a record of its own.
    pub fn emit(&mut self, event: E) {
        self.follow_ups.push(event);
    }

    pub(crate) fn into_follow_ups(self) -> Vec<E> {
        self.follow_ups
    }
}

/// Writes derived state for the event types it handles.
///
/// Runs inside the dispatch transaction. Returning an error rolls back the
/// whole publish, including the event record.
#[async_trait]
pub trait Projection<E: EventLike>: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Event types this projection registers for, in no particular order.
    fn handles(&self) -> &'static [&'static str];

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        event: &E,
        cx: &mut ApplyContext<E>,
    ) -> Result<ApplyResult>;
}
