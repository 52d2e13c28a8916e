use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::debug;

use crate::AppState;

#[derive(Deserialize)]
pub struct PollQuery {
    /// The event id the client is waiting for.
    e: i64,
}

/// `GET /poll?e=<id>`: answers once the committed cursor reaches `e`, or 304
/// when the poll timeout elapses first.
pub async fn api_poll(State(state): State<Arc<AppState>>, Query(query): Query<PollQuery>) -> impl IntoResponse {
    let tracker = state.engine.state();

    if tracker.wait_until(query.e, state.poll_timeout).await {
        let id = tracker.current_id();
        (StatusCode::OK, Json(serde_json::json!({"id": id}))).into_response()
    } else {
        debug!(target_id = query.e, current_id = tracker.current_id(), "Poll timed out");
        StatusCode::NOT_MODIFIED.into_response()
    }
}
