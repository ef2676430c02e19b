use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::{database::Store, state::AppState};

pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, "API Working")
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.store.ping().await {
        Ok(()) => "Connected",
        Err(_) => "Disconnected",
    };

    Json(json!({
        "status": "OK",
        "message": "Server is running",
        "database": database,
    }))
}
