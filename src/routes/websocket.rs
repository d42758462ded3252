use crate::app_state::AppState;
use crate::websocket::handlers::websocket_handler;
use axum::{routing::get, Router};

// Authentication happens in-band on the socket.
pub fn websocket_routes() -> Router<AppState> {
    Router::new().route("/ws", get(websocket_handler))
}
