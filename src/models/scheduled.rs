use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

use super::calls::CallType;

pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "scheduled_call_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScheduledCallStatus {
    Scheduled,
    Started,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rsvp_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RsvpStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledCall {
    pub id: i64,
    pub call_id: Uuid,
    pub room_name: String,
    pub call_type: CallType,
    pub created_by: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub timezone: String,
    pub recurrence: Json<serde_json::Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub join_link: String,
    pub status: ScheduledCallStatus,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub max_participants: i32,
    pub max_duration_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Invitee usernames, resolved on read.
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invitees: Vec<String>,
}

impl ScheduledCall {
    /// End of the joinable window, if the call has a duration limit.
    pub fn window_end(&self) -> Option<DateTime<Utc>> {
        (self.max_duration_seconds > 0)
            .then(|| self.scheduled_at + chrono::Duration::seconds(self.max_duration_seconds))
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledCallInvitation {
    pub id: i64,
    pub scheduled_call_id: i64,
    pub invitee_id: Uuid,
    pub status: RsvpStatus,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduledCallRequest {
    pub call_type: CallType,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub timezone: Option<String>,
    #[serde(default)]
    pub invitees: Vec<String>,
    #[serde(default)]
    pub recurrence: Option<serde_json::Value>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    pub max_participants: i32,
    #[serde(default)]
    pub max_duration_seconds: i64,
}

/// Fully defaulted scheduled call ready for insertion.
#[derive(Debug, Clone)]
pub struct NewScheduledCall {
    pub call_id: Uuid,
    pub room_name: String,
    pub call_type: CallType,
    pub created_by: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub timezone: String,
    pub recurrence: serde_json::Value,
    pub title: Option<String>,
    pub description: Option<String>,
    pub join_link: String,
    pub max_participants: i32,
    pub max_duration_seconds: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledCallUpdate {
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}
