use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::auth::AuthUser;
use crate::video::ParticipantUpdate;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MutePayload {
    #[validate(length(min = 1, max = 128))]
    pub track_sid: String,
    pub muted: bool,
}

pub async fn list_participants(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(call_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let identities = state
        .participants
        .list_participants(call_id, user.user_id)
        .await?;
    Ok(Json(identities))
}

pub async fn remove_participant(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((call_id, identity)): Path<(Uuid, String)>,
) -> AppResult<impl IntoResponse> {
    state
        .participants
        .remove_participant(call_id, user.user_id, &identity)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mute_track(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((call_id, identity)): Path<(Uuid, String)>,
    Json(payload): Json<MutePayload>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|_| AppError::BadRequest(anyhow!("Invalid inputs")))?;
    state
        .participants
        .mute_track(
            call_id,
            user.user_id,
            &identity,
            payload.track_sid.trim(),
            payload.muted,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_participant(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((call_id, identity)): Path<(Uuid, String)>,
    Json(update): Json<ParticipantUpdate>,
) -> AppResult<impl IntoResponse> {
    state
        .participants
        .update_participant(call_id, user.user_id, &identity, &update)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
