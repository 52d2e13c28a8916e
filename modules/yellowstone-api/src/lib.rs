//! HTTP surface for the task server: publish, long-poll, and read models.

pub mod config;
pub mod rest;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use yellowstone_state::{StateReader, TaskEngine};

pub use config::Config;

pub struct AppState {
    pub engine: TaskEngine,
    pub reader: StateReader,
    pub poll_timeout: Duration,
}

impl AppState {
    pub fn new(engine: TaskEngine, poll_timeout: Duration) -> Self {
        let reader = StateReader::new(engine.store().pool().clone());
        Self {
            engine,
            reader,
            poll_timeout,
        }
    }
}

pub fn build_router(state: Arc<AppState>, enable_cross_origin: bool) -> Router {
    let app = Router::new()
        // Health check
        .route("/status", get(|| async { "ok" }))
        // Write side
        .route("/publish", post(rest::publish::api_publish))
        .route("/poll", get(rest::poll::api_poll))
        // Read models
        .route("/api/tasklist/all", get(rest::api_task_lists_all))
        .route("/api/tasklist/todo", get(rest::api_task_lists_todo))
        .route("/api/tasklist/template", get(rest::api_task_lists_template))
        .route("/api/tasklist/archived", get(rest::api_task_lists_archived))
        .route("/api/tasklist/get", get(rest::api_task_list_get))
        .route("/api/tasklist/metadata", get(rest::api_task_list_metadata))
        .route("/api/tasklist/recent_comments", get(rest::api_task_list_recent_comments))
        .route("/api/tasklist/labels", get(rest::api_task_list_labels))
        .route("/api/task/list", get(rest::api_tasks_for_list))
        .route("/api/task/get", get(rest::api_task_get))
        .route("/api/task/history", get(rest::api_task_history))
        .with_state(state)
        // No caching: read models change with every commit
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let app = if enable_cross_origin {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    };

    // Logging layer: method + path only
    app.layer(
        tower_http::trace::TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        }),
    )
}
