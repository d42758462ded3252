use anyhow::anyhow;
use axum::{
    extract::{Query, State},
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
use crate::models::contacts::AddContactRequest;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveContactQuery {
    pub contact_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.contacts.list_contacts(user.user_id).await?))
}

pub async fn add_contact(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AddContactRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|_| AppError::BadRequest(anyhow!("Invalid inputs")))?;

    let contact = state.contacts.add_contact(&user, &payload.username).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn remove_contact(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<RemoveContactQuery>,
) -> AppResult<impl IntoResponse> {
    state
        .contacts
        .remove_contact(user.user_id, query.contact_id)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Contact removed" })))
}

pub async fn search_contacts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SearchQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.contacts.search_contacts(user.user_id, &query.q).await?))
}
