use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::warn;

use crate::AppState;

#[derive(Deserialize)]
pub struct PublishQuery {
    /// Client idempotency token.
    cid: Option<String>,
}

/// `POST /publish?cid=<token>` with a JSON event envelope.
pub async fn api_publish(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublishQuery>,
    body: Bytes,
) -> impl IntoResponse {
    let client_token = query.cid.unwrap_or_default();

    match state.engine.publish(&body, &client_token).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) if e.is_client_error() => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, client_token = %client_token, "Publish failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}
