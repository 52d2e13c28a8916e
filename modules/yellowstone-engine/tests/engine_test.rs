//! Integration tests for the Engine dispatch loop against in-memory SQLite.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use yellowstone_engine::{
    ApplyContext, ApplyResult, DispatchError, Engine, EventLike, Projection, ProjectionRegistry,
    PublishStatus, MAX_FOLLOW_UPS,
};
use yellowstone_events::{open_pool, AppendEvent, EventState, EventStore};

// ---------------------------------------------------------------------------
// Test event type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum TestEvent {
    #[serde(rename = "test:bump")]
    Bump { counter: String },
    #[serde(rename = "test:fail")]
    Fail { counter: String },
    #[serde(rename = "test:spawn")]
    Spawn { counter: String, n: u32 },
    #[serde(rename = "test:loop")]
    Loop,
}

const TEST_TYPES: &[&str] = &["test:bump", "test:fail", "test:spawn", "test:loop"];

impl EventLike for TestEvent {
    fn event_type_str(&self) -> &'static str {
        match self {
            TestEvent::Bump { .. } => "test:bump",
            TestEvent::Fail { .. } => "test:fail",
            TestEvent::Spawn { .. } => "test:spawn",
            TestEvent::Loop => "test:loop",
        }
    }

    fn decode(event_type: &str, envelope: &serde_json::Value) -> Option<Result<Self, serde_json::Error>> {
        if !TEST_TYPES.contains(&event_type) {
            return None;
        }
        Some(serde_json::from_value(envelope.clone()))
    }
}

// ---------------------------------------------------------------------------
// Test projections
// ---------------------------------------------------------------------------

async fn bump(conn: &mut SqliteConnection, counter: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO counters (name, value) VALUES (?1, 1)
         ON CONFLICT(name) DO UPDATE SET value = value + 1",
    )
    .bind(counter)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn trace(conn: &mut SqliteConnection, name: &str) -> Result<()> {
    sqlx::query("INSERT INTO trace (name) VALUES (?1)")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Counts bumps; writes before failing so rollback is observable.
struct CounterProjection;

#[async_trait]
impl Projection<TestEvent> for CounterProjection {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn handles(&self) -> &'static [&'static str] {
        &["test:bump", "test:fail", "test:spawn", "test:loop"]
    }

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        event: &TestEvent,
        cx: &mut ApplyContext<TestEvent>,
    ) -> Result<ApplyResult> {
        match event {
            TestEvent::Bump { counter } => {
                bump(conn, counter).await?;
                trace(conn, &format!("counter:{counter}")).await?;
            }
            TestEvent::Fail { counter } => {
                bump(conn, counter).await?;
                bail!("refusing {counter}");
            }
            TestEvent::Spawn { counter, n } => {
                trace(conn, "counter:spawn").await?;
                for _ in 0..*n {
                    cx.emit(TestEvent::Bump {
                        counter: counter.clone(),
                    });
                }
            }
            TestEvent::Loop => cx.emit(TestEvent::Loop),
        }
        Ok(ApplyResult::Applied)
    }
}

/// Records that it saw a bump, after the counter projection.
struct AuditProjection;

#[async_trait]
impl Projection<TestEvent> for AuditProjection {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn handles(&self) -> &'static [&'static str] {
        &["test:bump", "test:spawn"]
    }

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        event: &TestEvent,
        _cx: &mut ApplyContext<TestEvent>,
    ) -> Result<ApplyResult> {
        match event {
            TestEvent::Bump { .. } => trace(conn, "audit:bump").await?,
            TestEvent::Spawn { .. } => trace(conn, "audit:spawn").await?,
            _ => return Ok(ApplyResult::NoOp),
        }
        Ok(ApplyResult::Applied)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn test_engine() -> Engine<TestEvent> {
    engine_on(open_pool("sqlite::memory:", 1).await.unwrap()).await
}

async fn engine_on(pool: SqlitePool) -> Engine<TestEvent> {
    let store = EventStore::new(pool.clone());
    store.migrate().await.unwrap();

    sqlx::query("CREATE TABLE counters (name TEXT PRIMARY KEY, value INTEGER NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE trace (seq INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();

    let mut registry = ProjectionRegistry::new();
    registry.register(CounterProjection).register(AuditProjection);

    Engine::new(store, registry, Arc::new(EventState::new(0)))
}

async fn counter(engine: &Engine<TestEvent>, name: &str) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT value FROM counters WHERE name = ?1")
        .bind(name)
        .fetch_optional(engine.store().pool())
        .await
        .unwrap()
        .unwrap_or(0)
}

async fn traces(engine: &Engine<TestEvent>) -> Vec<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM trace ORDER BY seq")
        .fetch_all(engine.store().pool())
        .await
        .unwrap()
}

fn body(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

// =========================================================================
// Publish
// =========================================================================

#[tokio::test]
async fn publish_commits_event_and_projection() {
    let engine = test_engine().await;

    let outcome = engine
        .publish(&body(json!({"type": "test:bump", "counter": "a"})), "c-1")
        .await
        .unwrap();

    assert_eq!(outcome.status, PublishStatus::Success);
    assert_eq!(outcome.id, 1);
    assert_eq!(outcome.client_token, "c-1");
    assert_eq!(counter(&engine, "a").await, 1);
    assert_eq!(engine.state().current_id(), 1);

    let stored = engine.store().read_event(1).await.unwrap().unwrap();
    assert_eq!(stored.event_type, "test:bump");
    assert_eq!(stored.payload["counter"], "a");
}

#[tokio::test]
async fn outcome_serializes_with_camel_case_token() {
    let engine = test_engine().await;
    let outcome = engine
        .publish(&body(json!({"type": "test:bump", "counter": "a"})), "c-1")
        .await
        .unwrap();

    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value, json!({"status": "success", "id": 1, "clientToken": "c-1"}));
}

#[tokio::test]
async fn ids_increase_by_one_per_commit() {
    let engine = test_engine().await;
    for i in 1..=5 {
        let outcome = engine
            .publish(&body(json!({"type": "test:bump", "counter": "a"})), &format!("c-{i}"))
            .await
            .unwrap();
        assert_eq!(outcome.id, i);
    }
    assert_eq!(engine.state().current_id(), 5);
}

// =========================================================================
// Dedup
// =========================================================================

#[tokio::test]
async fn duplicate_token_returns_original_id_without_reapplying() {
    let engine = test_engine().await;
    let payload = body(json!({"type": "test:bump", "counter": "a"}));

    let first = engine.publish(&payload, "same").await.unwrap();
    let second = engine.publish(&payload, "same").await.unwrap();

    assert_eq!(first.status, PublishStatus::Success);
    assert_eq!(second.status, PublishStatus::Duplicate);
    assert_eq!(second.id, first.id);
    assert_eq!(counter(&engine, "a").await, 1);
    assert_eq!(engine.store().count().await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_check_ignores_differing_payload() {
    let engine = test_engine().await;

    engine
        .publish(&body(json!({"type": "test:bump", "counter": "a"})), "same")
        .await
        .unwrap();
    let again = engine
        .publish(&body(json!({"type": "test:bump", "counter": "b"})), "same")
        .await
        .unwrap();

    assert_eq!(again.status, PublishStatus::Duplicate);
    assert_eq!(counter(&engine, "b").await, 0);
}

#[tokio::test]
async fn concurrent_duplicates_commit_once() {
    let engine = test_engine().await;
    let payload = body(json!({"type": "test:bump", "counter": "a"}));

    let results =
        futures::future::join_all((0..5).map(|_| engine.publish(&payload, "raced"))).await;

    let outcomes: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    let successes = outcomes
        .iter()
        .filter(|o| o.status == PublishStatus::Success)
        .count();
    assert_eq!(successes, 1);
    assert!(outcomes.iter().all(|o| o.id == 1));
    assert_eq!(counter(&engine, "a").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_publishes_on_a_file_database_commit_once_per_token() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("events.db").display());
    let engine = Arc::new(engine_on(open_pool(&url, 5).await.unwrap()).await);

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let payload = body(json!({"type": "test:bump", "counter": "shared"}));
            let token = if i % 2 == 0 { "raced".to_string() } else { format!("own-{i}") };
            engine.publish(&payload, &token).await
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    let raced: Vec<_> = outcomes.iter().filter(|o| o.client_token == "raced").collect();
    assert_eq!(raced.iter().filter(|o| o.status == PublishStatus::Success).count(), 1);
    assert_eq!(raced.iter().filter(|o| o.status == PublishStatus::Duplicate).count(), 9);
    assert!(raced.iter().all(|o| o.id == raced[0].id));

    // Ten distinct tokens plus one winner for the shared token.
    assert_eq!(engine.store().count().await.unwrap(), 11);
    assert_eq!(counter(&engine, "shared").await, 11);
    assert_eq!(engine.state().current_id(), 11);
}

// =========================================================================
// Failure and rollback
// =========================================================================

#[tokio::test]
async fn handler_failure_rolls_back_everything() {
    let engine = test_engine().await;

    let err = engine
        .publish(&body(json!({"type": "test:fail", "counter": "x"})), "c-1")
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Handler { projection: "counter", .. }));
    assert!(!err.is_client_error());
    assert_eq!(counter(&engine, "x").await, 0);
    assert_eq!(engine.store().latest_id().await.unwrap(), 0);
    assert_eq!(engine.state().current_id(), 0);

    // Token is still free and the next commit takes id 1.
    let ok = engine
        .publish(&body(json!({"type": "test:bump", "counter": "x"})), "c-1")
        .await
        .unwrap();
    assert_eq!(ok.status, PublishStatus::Success);
    assert_eq!(ok.id, 1);
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let engine = test_engine().await;
    let err = engine
        .publish(&body(json!({"type": "test:bump", "counter": "a"})), "")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::MissingClientToken));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn malformed_envelopes_are_rejected() {
    let engine = test_engine().await;

    let err = engine.publish(b"not json", "c-1").await.unwrap_err();
    assert!(matches!(err, DispatchError::MalformedEnvelope(_)));

    let err = engine
        .publish(&body(json!({"counter": "a"})), "c-2")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::MalformedEnvelope(_)));

    assert_eq!(engine.store().latest_id().await.unwrap(), 0);
}

#[tokio::test]
async fn known_type_with_bad_payload_is_decode_error() {
    let engine = test_engine().await;
    let err = engine
        .publish(&body(json!({"type": "test:bump", "counter": 7})), "c-1")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Decode { ref event_type, .. } if event_type == "test:bump"));
    assert!(err.is_client_error());
}

// =========================================================================
// Unknown types
// =========================================================================

#[tokio::test]
async fn unknown_type_is_stored_but_not_projected() {
    let engine = test_engine().await;

    let outcome = engine
        .publish(&body(json!({"type": "test:mystery", "counter": "a"})), "c-1")
        .await
        .unwrap();

    assert_eq!(outcome.status, PublishStatus::Success);
    assert_eq!(outcome.id, 1);
    assert!(traces(&engine).await.is_empty());

    let all = engine.store().read_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].event_type, "test:mystery");
}

// =========================================================================
// Ordering and follow-ups
// =========================================================================

#[tokio::test]
async fn projections_run_in_registration_order() {
    let engine = test_engine().await;
    assert_eq!(engine.registry().projection_names("test:bump"), vec!["counter", "audit"]);

    engine
        .publish(&body(json!({"type": "test:bump", "counter": "a"})), "c-1")
        .await
        .unwrap();

    assert_eq!(traces(&engine).await, vec!["counter:a", "audit:bump"]);
}

#[tokio::test]
async fn follow_ups_apply_after_parent_projections() {
    let engine = test_engine().await;

    let outcome = engine
        .publish(&body(json!({"type": "test:spawn", "counter": "s", "n": 2})), "c-1")
        .await
        .unwrap();

    assert_eq!(counter(&engine, "s").await, 2);
    assert_eq!(
        traces(&engine).await,
        vec!["counter:spawn", "audit:spawn", "counter:s", "audit:bump", "counter:s", "audit:bump"]
    );

    // Follow-ups are not logged as events of their own.
    assert_eq!(outcome.id, 1);
    assert_eq!(engine.store().count().await.unwrap(), 1);
}

#[tokio::test]
async fn runaway_follow_ups_overflow_and_roll_back() {
    let engine = test_engine().await;

    let err = engine
        .publish(&body(json!({"type": "test:loop"})), "c-1")
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::FollowUpOverflow(n) if n == MAX_FOLLOW_UPS));
    assert_eq!(engine.store().latest_id().await.unwrap(), 0);
}

// =========================================================================
// Replay
// =========================================================================

#[tokio::test]
async fn replay_reapplies_without_appending() {
    let engine = test_engine().await;

    for (i, name) in ["a", "b", "a"].iter().enumerate() {
        engine
            .publish(&body(json!({"type": "test:bump", "counter": name})), &format!("c-{i}"))
            .await
            .unwrap();
    }
    engine
        .publish(&body(json!({"type": "test:mystery"})), "c-unknown")
        .await
        .unwrap();

    sqlx::query("DELETE FROM counters")
        .execute(engine.store().pool())
        .await
        .unwrap();

    let stats = engine.replay(0).await.unwrap();

    assert_eq!(stats.applied, 3);
    assert_eq!(stats.skipped, 1);
    assert_eq!(counter(&engine, "a").await, 2);
    assert_eq!(counter(&engine, "b").await, 1);
    assert_eq!(engine.store().count().await.unwrap(), 4);
}

#[tokio::test]
async fn replay_starts_at_requested_id() {
    let engine = test_engine().await;
    let store = engine.store().clone();

    for i in 1..=3 {
        store
            .append(&AppendEvent::new(
                "test:bump",
                json!({"type": "test:bump", "counter": "r"}),
                format!("c-{i}"),
            ))
            .await
            .unwrap();
    }

    let stats = engine.replay(2).await.unwrap();
    assert_eq!(stats.applied, 2);
    assert_eq!(counter(&engine, "r").await, 2);
}
