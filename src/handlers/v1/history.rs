use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::auth::AuthUser;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Paged by default; `start` and `end` together switch to a date range.
pub async fn call_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<impl IntoResponse> {
    let history = match (query.start, query.end) {
        (Some(start), Some(end)) => state.history.call_history_between(&user, start, end).await?,
        (None, None) => {
            state
                .history
                .call_history(&user, query.limit, query.offset)
                .await?
        }
        _ => {
            return Err(AppError::BadRequest(anyhow!(
                "Both start and end are required for a date range"
            )))
        }
    };
    Ok(Json(history))
}

pub async fn call_details(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(call_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.history.call_details(&user, call_id).await?))
}

pub async fn delete_call_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(call_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.history.delete_call_history(&user, call_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
