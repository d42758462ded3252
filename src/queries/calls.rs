use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use super::db_error;
use crate::error::AppResult;
use crate::models::calls::{Call, CallStatus, NewCall};

const CALL_COLUMNS: &str = "call_id, room_name, call_type, created_by, status, created_at, ended_at";

pub async fn insert_call(conn: &mut PgConnection, call: &NewCall) -> AppResult<Call> {
    sqlx::query_as::<_, Call>(&format!(
        "INSERT INTO calls (call_id, room_name, call_type, created_by, status)
         VALUES ($1, $2, $3, $4, 'active')
         RETURNING {CALL_COLUMNS}"
    ))
    .bind(call.call_id)
    .bind(&call.room_name)
    .bind(call.call_type)
    .bind(call.created_by)
    .fetch_one(conn)
    .await
    .map_err(db_error("insert_call"))
}

pub async fn find_call_by_id(conn: &mut PgConnection, call_id: Uuid) -> AppResult<Option<Call>> {
    sqlx::query_as::<_, Call>(&format!("SELECT {CALL_COLUMNS} FROM calls WHERE call_id = $1"))
        .bind(call_id)
        .fetch_optional(conn)
        .await
        .map_err(db_error("find_call_by_id"))
}

pub async fn find_call_by_room(
    conn: &mut PgConnection,
    room_name: &str,
) -> AppResult<Option<Call>> {
    sqlx::query_as::<_, Call>(&format!("SELECT {CALL_COLUMNS} FROM calls WHERE room_name = $1"))
        .bind(room_name)
        .fetch_optional(conn)
        .await
        .map_err(db_error("find_call_by_room"))
}

/// Moves the call to `to` only if it is currently `from`.
pub async fn update_call_status(
    conn: &mut PgConnection,
    call_id: Uuid,
    from: CallStatus,
    to: CallStatus,
    ended_at: Option<DateTime<Utc>>,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE calls SET status = $1, ended_at = COALESCE($2, ended_at)
         WHERE call_id = $3 AND status = $4",
    )
    .bind(to)
    .bind(ended_at)
    .bind(call_id)
    .bind(from)
    .execute(conn)
    .await
    .map_err(db_error("update_call_status"))?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_active_calls(conn: &mut PgConnection) -> AppResult<Vec<Call>> {
    sqlx::query_as::<_, Call>(&format!(
        "SELECT {CALL_COLUMNS} FROM calls WHERE status = 'active' ORDER BY created_at DESC"
    ))
    .fetch_all(conn)
    .await
    .map_err(db_error("get_active_calls"))
}
