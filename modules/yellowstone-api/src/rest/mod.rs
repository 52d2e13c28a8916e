pub mod poll;
pub mod publish;

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::AppState;

// --- Query structs ---

#[derive(Deserialize)]
pub struct IdQuery {
    id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListIdQuery {
    list_id: i64,
}

// --- Helpers ---

fn json_ok<T: Serialize>(value: T) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

fn internal_error(context: &str, e: anyhow::Error) -> Response {
    warn!(error = %e, "{context} failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": format!("{context} failed")})),
    )
        .into_response()
}

fn not_found(what: &str, id: i64) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": format!("{what} {id} not found")})),
    )
        .into_response()
}

// --- Task lists ---

pub async fn api_task_lists_all(State(state): State<Arc<AppState>>) -> Response {
    match state.reader.all_task_lists().await {
        Ok(lists) => json_ok(serde_json::json!({"taskLists": lists})),
        Err(e) => internal_error("Task list query", e),
    }
}

pub async fn api_task_lists_todo(State(state): State<Arc<AppState>>) -> Response {
    match state.reader.todo_lists().await {
        Ok(lists) => json_ok(serde_json::json!({"taskLists": lists})),
        Err(e) => internal_error("Task list query", e),
    }
}

pub async fn api_task_lists_template(State(state): State<Arc<AppState>>) -> Response {
    match state.reader.template_lists().await {
        Ok(lists) => json_ok(serde_json::json!({"taskLists": lists})),
        Err(e) => internal_error("Task list query", e),
    }
}

pub async fn api_task_lists_archived(State(state): State<Arc<AppState>>) -> Response {
    match state.reader.archived_lists().await {
        Ok(lists) => json_ok(serde_json::json!({"taskLists": lists})),
        Err(e) => internal_error("Task list query", e),
    }
}

pub async fn api_task_list_get(
    State(state): State<Arc<AppState>>,
    Query(q): Query<IdQuery>,
) -> Response {
    match state.reader.task_list(q.id).await {
        Ok(Some(list)) => json_ok(list),
        Ok(None) => not_found("Task list", q.id),
        Err(e) => internal_error("Task list lookup", e),
    }
}

pub async fn api_task_list_metadata(State(state): State<Arc<AppState>>) -> Response {
    match state.reader.list_metadata().await {
        Ok(metadata) => json_ok(serde_json::json!({"metadata": metadata})),
        Err(e) => internal_error("Task list metadata query", e),
    }
}

pub async fn api_task_list_recent_comments(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListIdQuery>,
) -> Response {
    match state.reader.recent_comments(q.list_id).await {
        Ok(comments) => json_ok(comments),
        Err(e) => internal_error("Recent comments query", e),
    }
}

pub async fn api_task_list_labels(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListIdQuery>,
) -> Response {
    match state.reader.task_labels(q.list_id).await {
        Ok(labels) => json_ok(labels),
        Err(e) => internal_error("Task label query", e),
    }
}

// --- Tasks ---

pub async fn api_tasks_for_list(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListIdQuery>,
) -> Response {
    match state.reader.tasks_for_list(q.list_id).await {
        Ok(tasks) => json_ok(serde_json::json!({"tasks": tasks})),
        Err(e) => internal_error("Task query", e),
    }
}

pub async fn api_task_get(
    State(state): State<Arc<AppState>>,
    Query(q): Query<IdQuery>,
) -> Response {
    match state.reader.task(q.id).await {
        Ok(Some(task)) => json_ok(task),
        Ok(None) => not_found("Task", q.id),
        Err(e) => internal_error("Task lookup", e),
    }
}

pub async fn api_task_history(
    State(state): State<Arc<AppState>>,
    Query(q): Query<IdQuery>,
) -> Response {
    match state.reader.task_history(q.id).await {
        Ok(Some(history)) => json_ok(history),
        Ok(None) => not_found("Task", q.id),
        Err(e) => internal_error("Task history query", e),
    }
}
