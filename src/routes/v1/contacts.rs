use crate::app_state::AppState;
use crate::handlers::v1::contacts;
use axum::routing::{delete, get, post};
use axum::Router;

pub fn contacts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(contacts::list_contacts))
        .route("/add", post(contacts::add_contact))
        .route("/remove", delete(contacts::remove_contact))
        .route("/search", get(contacts::search_contacts))
}
