use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use super::db_error;
use crate::error::{AppError, AppResult};
use crate::models::calls::{CallHistory, HistoryUpdate, NewCallHistory};

const HISTORY_COLUMNS: &str = "id, call_id, room_name, call_type, created_by, participants, \
                               started_at, ended_at, duration_seconds, status";

pub async fn insert_history(
    conn: &mut PgConnection,
    history: &NewCallHistory,
) -> AppResult<CallHistory> {
    sqlx::query_as::<_, CallHistory>(&format!(
        "INSERT INTO call_history (call_id, room_name, call_type, created_by, participants, status)
         VALUES ($1, $2, $3, $4, $5, 'pending')
         RETURNING {HISTORY_COLUMNS}"
    ))
    .bind(history.call_id)
    .bind(&history.room_name)
    .bind(history.call_type)
    .bind(history.created_by)
    .bind(Json(history.participants.clone()))
    .fetch_one(conn)
    .await
    .map_err(db_error("insert_history"))
}

pub async fn update_history(
    conn: &mut PgConnection,
    call_id: Uuid,
    update: &HistoryUpdate,
) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE call_history
         SET ended_at = COALESCE($1, ended_at), duration_seconds = $2, status = $3
         WHERE call_id = $4",
    )
    .bind(update.ended_at)
    .bind(update.duration_seconds)
    .bind(update.status)
    .bind(call_id)
    .execute(conn)
    .await
    .map_err(db_error("update_history"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(anyhow::anyhow!("Call history not found")));
    }
    Ok(())
}

pub async fn find_history_by_call_id(
    conn: &mut PgConnection,
    call_id: Uuid,
) -> AppResult<Option<CallHistory>> {
    sqlx::query_as::<_, CallHistory>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM call_history WHERE call_id = $1"
    ))
    .bind(call_id)
    .fetch_optional(conn)
    .await
    .map_err(db_error("find_history_by_call_id"))
}

/// History the user created or appears in as a participant, newest first.
pub async fn get_history_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    username: &str,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<CallHistory>> {
    sqlx::query_as::<_, CallHistory>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM call_history
         WHERE created_by = $1 OR participants ? $2
         ORDER BY started_at DESC, id DESC
         LIMIT $3 OFFSET $4"
    ))
    .bind(user_id)
    .bind(username)
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await
    .map_err(db_error("get_history_for_user"))
}

pub async fn get_history_for_user_between(
    conn: &mut PgConnection,
    user_id: Uuid,
    username: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AppResult<Vec<CallHistory>> {
    sqlx::query_as::<_, CallHistory>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM call_history
         WHERE (created_by = $1 OR participants ? $2)
           AND started_at >= $3 AND started_at <= $4
         ORDER BY started_at DESC, id DESC"
    ))
    .bind(user_id)
    .bind(username)
    .bind(start)
    .bind(end)
    .fetch_all(conn)
    .await
    .map_err(db_error("get_history_for_user_between"))
}

pub async fn delete_history(conn: &mut PgConnection, call_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM call_history WHERE call_id = $1")
        .bind(call_id)
        .execute(conn)
        .await
        .map_err(db_error("delete_history"))?;
    Ok(result.rows_affected() > 0)
}
