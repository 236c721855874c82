use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::ax_state::AppState;
use crate::infra::db;

/// Database-backed liveness probe.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    match db::ping(&state.db).await {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"ok": false, "error": e.to_string()})),
        )
            .into_response(),
    }
}

/// `/` answers with a client redirect to the documentation page.
pub async fn root(State(state): State<Arc<AppState>>) -> Response {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, state.config.api.docs.docs_path.clone())
        .body(axum::body::Body::empty())
        .unwrap()
}

pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}
