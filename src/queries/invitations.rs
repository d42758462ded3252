use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use super::db_error;
use crate::error::AppResult;
use crate::models::calls::{Invitation, InvitationStatus, NewInvitation};

const INVITATION_SELECT: &str = r#"
    SELECT i.id, i.call_id, i.inviter_id, inviter.username AS inviter_name,
           i.invitee_id, invitee.username AS invitee_name,
           c.call_type, c.room_name, i.status, i.created_at, i.responded_at
    FROM call_invitations i
    JOIN calls c ON c.call_id = i.call_id
    JOIN users inviter ON inviter.id = i.inviter_id
    JOIN users invitee ON invitee.id = i.invitee_id
"#;

pub async fn insert_invitation(
    conn: &mut PgConnection,
    invitation: &NewInvitation,
) -> AppResult<Invitation> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO call_invitations (call_id, inviter_id, invitee_id, status)
         VALUES ($1, $2, $3, 'pending')
         RETURNING id",
    )
    .bind(invitation.call_id)
    .bind(invitation.inviter_id)
    .bind(invitation.invitee_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("insert_invitation"))?;

    sqlx::query_as::<_, Invitation>(&format!("{INVITATION_SELECT} WHERE i.id = $1"))
        .bind(id)
        .fetch_one(conn)
        .await
        .map_err(db_error("insert_invitation"))
}

pub async fn find_invitation_by_id(
    conn: &mut PgConnection,
    invitation_id: i64,
) -> AppResult<Option<Invitation>> {
    sqlx::query_as::<_, Invitation>(&format!("{INVITATION_SELECT} WHERE i.id = $1"))
        .bind(invitation_id)
        .fetch_optional(conn)
        .await
        .map_err(db_error("find_invitation_by_id"))
}

pub async fn get_pending_invitations_for_user(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Vec<Invitation>> {
    sqlx::query_as::<_, Invitation>(&format!(
        "{INVITATION_SELECT} WHERE i.invitee_id = $1 AND i.status = 'pending'
         ORDER BY i.created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(conn)
    .await
    .map_err(db_error("get_pending_invitations_for_user"))
}

pub async fn get_invitations_for_call(
    conn: &mut PgConnection,
    call_id: Uuid,
) -> AppResult<Vec<Invitation>> {
    sqlx::query_as::<_, Invitation>(&format!(
        "{INVITATION_SELECT} WHERE i.call_id = $1 ORDER BY i.id"
    ))
    .bind(call_id)
    .fetch_all(conn)
    .await
    .map_err(db_error("get_invitations_for_call"))
}

/// Moves the invitation to `to` only if it is currently `from`.
pub async fn update_invitation_status(
    conn: &mut PgConnection,
    invitation_id: i64,
    from: InvitationStatus,
    to: InvitationStatus,
    responded_at: DateTime<Utc>,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE call_invitations SET status = $1, responded_at = $2
         WHERE id = $3 AND status = $4",
    )
    .bind(to)
    .bind(responded_at)
    .bind(invitation_id)
    .bind(from)
    .execute(conn)
    .await
    .map_err(db_error("update_invitation_status"))?;

    Ok(result.rows_affected() == 1)
}
