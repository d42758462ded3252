use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use super::db_error;
use crate::error::AppResult;
use crate::models::scheduled::{
    NewScheduledCall, RsvpStatus, ScheduledCall, ScheduledCallInvitation, ScheduledCallStatus,
    ScheduledCallUpdate,
};

const SCHEDULED_COLUMNS: &str = "sc.id, sc.call_id, sc.room_name, sc.call_type, sc.created_by, \
    sc.scheduled_at, sc.timezone, sc.recurrence, sc.title, sc.description, sc.join_link, \
    sc.status, sc.reminder_sent_at, sc.max_participants, sc.max_duration_seconds, \
    sc.created_at, sc.updated_at";

const INVITATION_COLUMNS: &str =
    "id, scheduled_call_id, invitee_id, status, reminder_sent_at, created_at";

pub async fn insert_scheduled_call(
    conn: &mut PgConnection,
    call: &NewScheduledCall,
) -> AppResult<ScheduledCall> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO scheduled_calls (call_id, room_name, call_type, created_by, scheduled_at,
             timezone, recurrence, title, description, join_link, status,
             max_participants, max_duration_seconds)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'scheduled', $11, $12)
         RETURNING id",
    )
    .bind(call.call_id)
    .bind(&call.room_name)
    .bind(call.call_type)
    .bind(call.created_by)
    .bind(call.scheduled_at)
    .bind(&call.timezone)
    .bind(Json(call.recurrence.clone()))
    .bind(&call.title)
    .bind(&call.description)
    .bind(&call.join_link)
    .bind(call.max_participants)
    .bind(call.max_duration_seconds)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("insert_scheduled_call"))?;

    sqlx::query_as::<_, ScheduledCall>(&format!(
        "SELECT {SCHEDULED_COLUMNS} FROM scheduled_calls sc WHERE sc.id = $1"
    ))
    .bind(id)
    .fetch_one(conn)
    .await
    .map_err(db_error("insert_scheduled_call"))
}

pub async fn find_scheduled_call_by_id(
    conn: &mut PgConnection,
    id: i64,
) -> AppResult<Option<ScheduledCall>> {
    sqlx::query_as::<_, ScheduledCall>(&format!(
        "SELECT {SCHEDULED_COLUMNS} FROM scheduled_calls sc WHERE sc.id = $1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(db_error("find_scheduled_call_by_id"))
}

pub async fn get_scheduled_calls_by_creator(
    conn: &mut PgConnection,
    user_id: Uuid,
    status: Option<ScheduledCallStatus>,
) -> AppResult<Vec<ScheduledCall>> {
    sqlx::query_as::<_, ScheduledCall>(&format!(
        "SELECT {SCHEDULED_COLUMNS} FROM scheduled_calls sc
         WHERE sc.created_by = $1 AND ($2::scheduled_call_status IS NULL OR sc.status = $2)
         ORDER BY sc.scheduled_at ASC"
    ))
    .bind(user_id)
    .bind(status)
    .fetch_all(conn)
    .await
    .map_err(db_error("get_scheduled_calls_by_creator"))
}

pub async fn get_scheduled_calls_by_invitee(
    conn: &mut PgConnection,
    user_id: Uuid,
    status: Option<ScheduledCallStatus>,
) -> AppResult<Vec<ScheduledCall>> {
    sqlx::query_as::<_, ScheduledCall>(&format!(
        "SELECT {SCHEDULED_COLUMNS} FROM scheduled_calls sc
         JOIN scheduled_call_invitations sci ON sci.scheduled_call_id = sc.id
         WHERE sci.invitee_id = $1 AND ($2::scheduled_call_status IS NULL OR sc.status = $2)
         ORDER BY sc.scheduled_at ASC"
    ))
    .bind(user_id)
    .bind(status)
    .fetch_all(conn)
    .await
    .map_err(db_error("get_scheduled_calls_by_invitee"))
}

pub async fn get_upcoming_scheduled_calls(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
    limit: i64,
) -> AppResult<Vec<ScheduledCall>> {
    sqlx::query_as::<_, ScheduledCall>(&format!(
        "SELECT {SCHEDULED_COLUMNS} FROM scheduled_calls sc
         WHERE sc.status = 'scheduled' AND sc.scheduled_at >= $1
         ORDER BY sc.scheduled_at ASC
         LIMIT $2"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(conn)
    .await
    .map_err(db_error("get_upcoming_scheduled_calls"))
}

/// Moves the scheduled call to `to` only if it is currently `from`.
pub async fn update_scheduled_call_status(
    conn: &mut PgConnection,
    id: i64,
    from: ScheduledCallStatus,
    to: ScheduledCallStatus,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE scheduled_calls SET status = $1, updated_at = NOW()
         WHERE id = $2 AND status = $3",
    )
    .bind(to)
    .bind(id)
    .bind(from)
    .execute(conn)
    .await
    .map_err(db_error("update_scheduled_call_status"))?;

    Ok(result.rows_affected() == 1)
}

pub async fn update_reminder_sent(
    conn: &mut PgConnection,
    id: i64,
    at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query("UPDATE scheduled_calls SET reminder_sent_at = $1, updated_at = NOW() WHERE id = $2")
        .bind(at)
        .bind(id)
        .execute(conn)
        .await
        .map_err(db_error("update_reminder_sent"))?;
    Ok(())
}

/// A new `scheduled_at` re-arms the reminder.
pub async fn update_scheduled_call_details(
    conn: &mut PgConnection,
    id: i64,
    update: &ScheduledCallUpdate,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE scheduled_calls
         SET title = COALESCE($1, title),
             description = COALESCE($2, description),
             scheduled_at = COALESCE($3, scheduled_at),
             reminder_sent_at = CASE WHEN $3 IS NULL THEN reminder_sent_at ELSE NULL END,
             updated_at = NOW()
         WHERE id = $4 AND status = 'scheduled'",
    )
    .bind(&update.title)
    .bind(&update.description)
    .bind(update.scheduled_at)
    .bind(id)
    .execute(conn)
    .await
    .map_err(db_error("update_scheduled_call_details"))?;

    Ok(result.rows_affected() == 1)
}

pub async fn delete_scheduled_call(conn: &mut PgConnection, id: i64) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM scheduled_calls WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await
        .map_err(db_error("delete_scheduled_call"))?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_scheduled_invitation(
    conn: &mut PgConnection,
    scheduled_call_id: i64,
    invitee_id: Uuid,
) -> AppResult<ScheduledCallInvitation> {
    sqlx::query_as::<_, ScheduledCallInvitation>(&format!(
        "INSERT INTO scheduled_call_invitations (scheduled_call_id, invitee_id, status)
         VALUES ($1, $2, 'pending')
         RETURNING {INVITATION_COLUMNS}"
    ))
    .bind(scheduled_call_id)
    .bind(invitee_id)
    .fetch_one(conn)
    .await
    .map_err(db_error("insert_scheduled_invitation"))
}

pub async fn get_scheduled_invitations(
    conn: &mut PgConnection,
    scheduled_call_id: i64,
) -> AppResult<Vec<ScheduledCallInvitation>> {
    sqlx::query_as::<_, ScheduledCallInvitation>(&format!(
        "SELECT {INVITATION_COLUMNS} FROM scheduled_call_invitations
         WHERE scheduled_call_id = $1 ORDER BY id"
    ))
    .bind(scheduled_call_id)
    .fetch_all(conn)
    .await
    .map_err(db_error("get_scheduled_invitations"))
}

pub async fn update_scheduled_invitation_status(
    conn: &mut PgConnection,
    scheduled_call_id: i64,
    invitee_id: Uuid,
    from: RsvpStatus,
    to: RsvpStatus,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE scheduled_call_invitations SET status = $1
         WHERE scheduled_call_id = $2 AND invitee_id = $3 AND status = $4",
    )
    .bind(to)
    .bind(scheduled_call_id)
    .bind(invitee_id)
    .bind(from)
    .execute(conn)
    .await
    .map_err(db_error("update_scheduled_invitation_status"))?;

    Ok(result.rows_affected() == 1)
}

pub async fn update_scheduled_invitation_reminder_sent(
    conn: &mut PgConnection,
    invitation_id: i64,
    at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query("UPDATE scheduled_call_invitations SET reminder_sent_at = $1 WHERE id = $2")
        .bind(at)
        .bind(invitation_id)
        .execute(conn)
        .await
        .map_err(db_error("update_scheduled_invitation_reminder_sent"))?;
    Ok(())
}
