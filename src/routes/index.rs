use crate::app_state::AppState;
use crate::handlers::index::{health, hello};
use axum::{routing::get, Router};

pub fn index_route() -> Router<AppState> {
    Router::new()
        .route("/", get(hello))
        .route("/health", get(health))
}
