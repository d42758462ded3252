use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::AppResult;
use crate::handlers::v1::calls::RespondPayload;
use crate::models::auth::AuthUser;
use crate::models::scheduled::{
    CreateScheduledCallRequest, ScheduledCallStatus, ScheduledCallUpdate,
};

#[derive(Debug, Default, Deserialize)]
pub struct ScheduledQuery {
    pub status: Option<ScheduledCallStatus>,
}

pub async fn create_scheduled_call(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateScheduledCallRequest>,
) -> AppResult<impl IntoResponse> {
    let call = state
        .scheduled
        .create_scheduled_call(user.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(call)))
}

pub async fn get_scheduled_calls(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ScheduledQuery>,
) -> AppResult<impl IntoResponse> {
    let calls = state
        .scheduled
        .get_scheduled_calls(user.user_id, query.status)
        .await?;
    Ok(Json(calls))
}

pub async fn get_scheduled_call(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(
        state.scheduled.get_scheduled_call(id, user.user_id).await?,
    ))
}

pub async fn update_scheduled_call(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(update): Json<ScheduledCallUpdate>,
) -> AppResult<impl IntoResponse> {
    let call = state
        .scheduled
        .update_scheduled_call(id, user.user_id, update)
        .await?;
    Ok(Json(call))
}

pub async fn cancel_scheduled_call(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    state
        .scheduled
        .cancel_scheduled_call(id, user.user_id)
        .await?;
    Ok((StatusCode::OK, "scheduled call cancelled"))
}

pub async fn start_scheduled_call(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let result = state
        .scheduled
        .start_scheduled_call(id, user.user_id)
        .await?;
    Ok(Json(result))
}

pub async fn respond_to_scheduled_invitation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<RespondPayload>,
) -> AppResult<impl IntoResponse> {
    state
        .scheduled
        .respond_to_scheduled_invitation(id, user.user_id, payload.action)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
