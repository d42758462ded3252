use crate::app_state::AppState;
use crate::handlers::v1::scheduled;
use axum::routing::{get, post};
use axum::Router;

pub fn scheduled_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(scheduled::create_scheduled_call).get(scheduled::get_scheduled_calls),
        )
        .route(
            "/{id}",
            get(scheduled::get_scheduled_call).patch(scheduled::update_scheduled_call),
        )
        .route("/{id}/cancel", post(scheduled::cancel_scheduled_call))
        .route("/{id}/start", post(scheduled::start_scheduled_call))
        .route("/{id}/respond", post(scheduled::respond_to_scheduled_invitation))
}
