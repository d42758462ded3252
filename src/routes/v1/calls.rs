use crate::app_state::AppState;
use crate::handlers::v1::{calls, history, participants};
use axum::routing::{get, post};
use axum::Router;

pub fn calls_routes() -> Router<AppState> {
    Router::new()
        .route("/invite", post(calls::create_call))
        .route("/invitations", get(calls::pending_invitations))
        .route("/invitations/{id}/respond", post(calls::respond_to_invitation))
        .route("/history", get(history::call_history))
        .route(
            "/history/{call_id}",
            get(history::call_details).delete(history::delete_call_history),
        )
        .route("/{call_id}/end", post(calls::end_call))
        .route("/{call_id}/cancel", post(calls::cancel_call))
        .route("/{call_id}/participants", get(participants::list_participants))
        .route(
            "/{call_id}/participants/{identity}/remove",
            post(participants::remove_participant),
        )
        .route(
            "/{call_id}/participants/{identity}/mute",
            post(participants::mute_track),
        )
        .route(
            "/{call_id}/participants/{identity}/update",
            post(participants::update_participant),
        )
}
