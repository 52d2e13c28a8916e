//! Task domain: events, projections, ordering, and read models.
//!
//! The projection tables are a pure function of the event log. [`rebuild`]
//! drops them and replays the log to prove it.

pub mod events;
pub mod ordering;
pub mod projections;
pub mod reader;
pub mod schema;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use yellowstone_engine::{Engine, ProjectionRegistry, ReplayStats};
use yellowstone_events::{EventState, EventStore};

pub use events::TaskEvent;
pub use reader::StateReader;

use projections::{TaskHistoryProjection, TaskListProjection, TaskProjection, TaskToListProjection};

pub type TaskEngine = Engine<TaskEvent>;

/// The task projections in dispatch order. For a type handled by several
/// projections they run task list, task, membership, then history.
pub fn registry() -> ProjectionRegistry<TaskEvent> {
    let mut registry = ProjectionRegistry::new();
    registry
        .register(TaskListProjection)
        .register(TaskProjection)
        .register(TaskToListProjection)
        .register(TaskHistoryProjection);
    registry
}

/// Bootstrap the log and projection tables, and start the cursor at the last
/// committed id.
pub async fn open_engine(store: EventStore) -> Result<TaskEngine> {
    store.migrate().await?;
    schema::migrate(store.pool()).await?;

    let latest = store.latest_id().await?;
    info!(latest_id = latest, "Event log opened");

    Ok(Engine::new(store, registry(), Arc::new(EventState::new(latest))))
}

/// Drop every projection table and replay the whole log into fresh ones.
pub async fn rebuild(engine: &TaskEngine) -> Result<ReplayStats> {
    schema::reset(engine.store().pool()).await?;
    let stats = engine.replay(0).await?;
    info!(applied = stats.applied, skipped = stats.skipped, "Projections rebuilt");
    Ok(stats)
}
