use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "call_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Video,
    Voice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "call_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Active,
    Ended,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "history_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Pending,
    Completed,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationAction {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub call_id: Uuid,
    pub room_name: String,
    pub call_type: CallType,
    pub created_by: Uuid,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Invitation row joined with the inviter/invitee usernames.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: i64,
    pub call_id: Uuid,
    pub inviter_id: Uuid,
    #[serde(rename = "inviter")]
    pub inviter_name: String,
    pub invitee_id: Uuid,
    #[serde(rename = "invitee")]
    pub invitee_name: String,
    pub call_type: CallType,
    pub room_name: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CallHistory {
    pub id: i64,
    pub call_id: Uuid,
    pub room_name: String,
    pub call_type: CallType,
    pub created_by: Uuid,
    pub participants: Json<Vec<String>>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub status: HistoryStatus,
}

#[derive(Debug, Clone)]
pub struct NewCall {
    pub call_id: Uuid,
    pub room_name: String,
    pub call_type: CallType,
    pub created_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub call_id: Uuid,
    pub inviter_id: Uuid,
    pub invitee_id: Uuid,
    pub call_type: CallType,
    pub room_name: String,
}

#[derive(Debug, Clone)]
pub struct NewCallHistory {
    pub call_id: Uuid,
    pub room_name: String,
    pub call_type: CallType,
    pub created_by: Uuid,
    pub participants: Vec<String>,
}

/// Terminal bookkeeping for a history record. `ended_at: None` leaves the
/// stored end time untouched.
#[derive(Debug, Clone)]
pub struct HistoryUpdate {
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub status: HistoryStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallResult {
    pub call_id: Uuid,
    pub room_name: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinDetails {
    pub token: String,
    pub room_name: String,
}
