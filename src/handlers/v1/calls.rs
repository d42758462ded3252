use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::auth::AuthUser;
use crate::models::calls::{CallType, InvitationAction};

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallPayload {
    pub call_type: CallType,
    #[serde(default)]
    #[validate(length(max = 100, message = "Too many invitees"))]
    pub invitees: Vec<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 128, message = "Room name must be 1-128 characters"))]
    pub room_name: Option<String>,
}

#[derive(Deserialize)]
pub struct RespondPayload {
    pub action: InvitationAction,
}

pub async fn create_call(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(mut payload): Json<CreateCallPayload>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|_| AppError::BadRequest(anyhow!("Invalid inputs")))?;

    payload.invitees = payload
        .invitees
        .iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let result = state
        .calls
        .create_call_and_invite(
            user.user_id,
            payload.call_type,
            &payload.invitees,
            payload.room_name,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn pending_invitations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let invitations = state.calls.pending_invitations(user.user_id).await?;
    Ok(Json(invitations))
}

pub async fn respond_to_invitation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(invitation_id): Path<i64>,
    Json(payload): Json<RespondPayload>,
) -> AppResult<impl IntoResponse> {
    let join = state
        .calls
        .respond_to_invitation(invitation_id, user.user_id, payload.action)
        .await?;
    Ok(Json(json!({
        "action": payload.action,
        "join": join,
    })))
}

pub async fn end_call(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(call_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.calls.end_call(call_id, user.user_id).await?;
    Ok((StatusCode::OK, "call ended"))
}

pub async fn cancel_call(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(call_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.calls.cancel_call(call_id, user.user_id).await?;
    Ok((StatusCode::OK, "call cancelled"))
}
