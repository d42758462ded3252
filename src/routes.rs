mod index;
mod v1;
mod websocket;
use crate::app_state::AppState;
use axum::{http::header, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_routes(state: AppState) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .merge(index::index_route())
        .merge(websocket::websocket_routes())
        .nest("/api/v1", v1::v1_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
