//! The dispatch loop.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use yellowstone_events::{AppendEvent, EventState, EventStore, StoreError, StoredEvent};

use crate::error::DispatchError;
use crate::registry::ProjectionRegistry;
use crate::traits::{ApplyContext, EventLike};

/// Upper bound on follow-up events applied for one published event.
pub const MAX_FOLLOW_UPS: usize = 64;

const REPLAY_BATCH: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Success,
    /// The client token was already committed; `id` is the earlier event.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub status: PublishStatus,
    pub id: i64,
    pub client_token: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub skipped: usize,
}

enum Decoded<E> {
    Known(E),
    /// A type this build does not know. Logged, never projected.
    Unrecognized,
}

/// Publishes events: projections and the log row commit together or not at all.
///
/// Write transactions are serialized by `writer`. Projections read before
/// they write, and SQLite cannot upgrade a deferred read transaction while
/// another connection holds the write lock, so two writers never overlap.
pub struct Engine<E: EventLike> {
    store: EventStore,
    registry: ProjectionRegistry<E>,
    state: Arc<EventState>,
    writer: Mutex<()>,
}

impl<E: EventLike> Engine<E> {
    pub fn new(store: EventStore, registry: ProjectionRegistry<E>, state: Arc<EventState>) -> Self {
        Self {
            store,
            registry,
            state,
            writer: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn registry(&self) -> &ProjectionRegistry<E> {
        &self.registry
    }

    /// The cursor long-poll readers wait on.
    pub fn state(&self) -> &Arc<EventState> {
        &self.state
    }

    /// Publish a raw JSON envelope `{"type": ..., ...fields}`.
    pub async fn publish(&self, body: &[u8], client_token: &str) -> Result<PublishOutcome, DispatchError> {
        let envelope: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| DispatchError::MalformedEnvelope(e.to_string()))?;

        let event_type = envelope
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| DispatchError::MalformedEnvelope("missing string `type` field".into()))?
            .to_string();

        self.dispatch(envelope, &event_type, client_token).await
    }

    /// Decode, dedup, project, append, commit, advance the cursor.
    pub async fn dispatch(
        &self,
        payload: serde_json::Value,
        declared_type: &str,
        client_token: &str,
    ) -> Result<PublishOutcome, DispatchError> {
        if client_token.is_empty() {
            return Err(DispatchError::MissingClientToken);
        }

        let decoded = decode::<E>(declared_type, &payload)?;

        // Held until commit, so a racing publish of the same token sees ours.
        let _writer = self.writer.lock().await;

        if let Some(id) = self.check_or_reserve(client_token).await? {
            info!(id, client_token, event_type = declared_type, "Duplicate publish");
            return Ok(duplicate(id, client_token));
        }

        let append = AppendEvent::new(declared_type, payload, client_token);

        match self.apply_and_append(&decoded, &append).await {
            Ok(stored) => {
                self.state.advance(stored.id);
                info!(id = stored.id, event_type = declared_type, "Event committed");
                Ok(PublishOutcome {
                    status: PublishStatus::Success,
                    id: stored.id,
                    client_token: client_token.to_string(),
                })
            }
            // Lost a race with a concurrent publish of the same token: our
            // transaction rolled back, theirs committed. Report theirs.
            Err(DispatchError::Storage(StoreError::DuplicateClientToken(_))) => {
                match self.store.find_by_client_token(client_token).await? {
                    Some(id) => {
                        info!(id, client_token, "Duplicate publish resolved after token conflict");
                        Ok(duplicate(id, client_token))
                    }
                    None => Err(StoreError::DuplicateClientToken(client_token.to_string()).into()),
                }
            }
            Err(e) => {
                warn!(error = %e, event_type = declared_type, client_token, "Publish rolled back");
                Err(e)
            }
        }
    }

    /// Dedup guard: the id already committed under `client_token`, if any.
    ///
    /// `dispatch` calls this under the writer lock. Outside it a `None` answer
    /// is not a reservation; the log's uniqueness constraint on the token is,
    /// and it is checked inside the same transaction as the projection writes.
    pub async fn check_or_reserve(&self, client_token: &str) -> Result<Option<i64>, DispatchError> {
        Ok(self.store.find_by_client_token(client_token).await?)
    }

    /// Re-apply stored events with id >= `from_id` through the projections,
    /// one transaction per event, without appending anything.
    ///
    /// Used to rebuild projection tables from the log.
    pub async fn replay(&self, from_id: i64) -> Result<ReplayStats, DispatchError> {
        let mut stats = ReplayStats::default();
        let mut next_id = from_id;

        loop {
            let batch = self.store.read_from(next_id, REPLAY_BATCH).await?;
            let Some(last) = batch.last() else {
                break;
            };
            next_id = last.id + 1;

            for stored in &batch {
                match decode::<E>(&stored.event_type, &stored.payload)? {
                    Decoded::Known(event) => {
                        let _writer = self.writer.lock().await;
                        let mut tx = self.store.pool().begin().await?;
                        self.apply_in(&mut *tx, &event, stored.committed_at).await?;
                        tx.commit().await?;
                        stats.applied += 1;
                    }
                    Decoded::Unrecognized => stats.skipped += 1,
                }
            }
        }

        info!(applied = stats.applied, skipped = stats.skipped, from_id, "Replay complete");
        Ok(stats)
    }

    async fn apply_and_append(
        &self,
        decoded: &Decoded<E>,
        append: &AppendEvent,
    ) -> Result<StoredEvent, DispatchError> {
        let mut tx = self.store.pool().begin().await?;

        if let Decoded::Known(event) = decoded {
            self.apply_in(&mut *tx, event, append.committed_at).await?;
        } else {
            debug!(event_type = %append.event_type, "Unrecognized event type, storing unprojected");
        }

        // The log row is the last write of the transaction.
        let stored = EventStore::append_in(&mut *tx, append).await?;
        tx.commit().await?;
        Ok(stored)
    }

    /// Run `event` and every follow-up it emits through their projections.
    /// Follow-ups are applied breadth-first after all projections of the
    /// event that emitted them.
    async fn apply_in(
        &self,
        conn: &mut SqliteConnection,
        event: &E,
        committed_at: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        let mut queue: VecDeque<E> = VecDeque::new();
        queue.push_back(event.clone());
        let mut follow_ups = 0usize;

        while let Some(evt) = queue.pop_front() {
            let event_type = evt.event_type_str();
            let mut cx = ApplyContext::new(committed_at);

            for projection in self.registry.handlers_for(event_type) {
                let result = projection
                    .apply(&mut *conn, &evt, &mut cx)
                    .await
                    .map_err(|source| DispatchError::Handler {
                        projection: projection.name(),
                        event_type,
                        source,
                    })?;
                debug!(projection = projection.name(), event_type, ?result, "Projection applied");
            }

            for child in cx.into_follow_ups() {
                follow_ups += 1;
                if follow_ups > MAX_FOLLOW_UPS {
                    return Err(DispatchError::FollowUpOverflow(MAX_FOLLOW_UPS));
                }
                queue.push_back(child);
            }
        }

        Ok(())
    }
}

fn decode<E: EventLike>(event_type: &str, payload: &serde_json::Value) -> Result<Decoded<E>, DispatchError> {
    match E::decode(event_type, payload) {
        Some(Ok(event)) => Ok(Decoded::Known(event)),
        Some(Err(source)) => Err(DispatchError::Decode {
            event_type: event_type.to_string(),
            source,
        }),
        None => Ok(Decoded::Unrecognized),
    }
}

fn duplicate(id: i64, client_token: &str) -> PublishOutcome {
    PublishOutcome {
        status: PublishStatus::Duplicate,
        id,
        client_token: client_token.to_string(),
    }
}
