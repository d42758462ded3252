pub mod calls;
pub mod contacts;
pub mod scheduled;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::{middleware, Router};

pub fn v1_routes(state: AppState) -> Router<AppState> {
    // Every v1 route requires a bearer token
    Router::new()
        .nest("/calls", calls::calls_routes())
        .nest("/contacts", contacts::contacts_routes())
        .nest("/scheduled", scheduled::scheduled_routes())
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}
