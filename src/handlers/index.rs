use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::app_state::AppState;

pub async fn hello() -> &'static str {
    "calling backend"
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "connections": state.hub.connection_count(),
    }))
}
