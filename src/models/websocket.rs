use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::calls::{CallHistory, CallType, Invitation, InvitationStatus};
use super::scheduled::ScheduledCall;

/// Event pushed to a connected client. Serialised as
/// `{"type": <snake_case name>, "data": <payload>}`, one per frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    CallInvitation(InvitationPayload),
    InvitationAccepted(InvitationResponsePayload),
    InvitationRejected(InvitationResponsePayload),
    CallEnded(CallEventPayload),
    CallCancelled(CallEventPayload),
    ScheduledCallCreated(ScheduledCall),
    ScheduledCallReminder(ReminderPayload),
    ScheduledCallStarting(ScheduledCall),
    CallHistoryUpdated(CallHistory),
    ParticipantStateChanged(ParticipantStatePayload),
    Authenticated,
    Pong,
    Error { message: String },
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::CallInvitation(_) => "call_invitation",
            ServerEvent::InvitationAccepted(_) => "invitation_accepted",
            ServerEvent::InvitationRejected(_) => "invitation_rejected",
            ServerEvent::CallEnded(_) => "call_ended",
            ServerEvent::CallCancelled(_) => "call_cancelled",
            ServerEvent::ScheduledCallCreated(_) => "scheduled_call_created",
            ServerEvent::ScheduledCallReminder(_) => "scheduled_call_reminder",
            ServerEvent::ScheduledCallStarting(_) => "scheduled_call_starting",
            ServerEvent::CallHistoryUpdated(_) => "call_history_updated",
            ServerEvent::ParticipantStateChanged(_) => "participant_state_changed",
            ServerEvent::Authenticated => "authenticated",
            ServerEvent::Pong => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }

    pub fn invitation_response(invitation: &Invitation, status: InvitationStatus) -> Self {
        let payload = InvitationResponsePayload {
            invitation_id: invitation.id,
            call_id: invitation.call_id,
            invitee: invitation.invitee_name.clone(),
            status,
            timestamp: Utc::now(),
        };
        if status == InvitationStatus::Accepted {
            ServerEvent::InvitationAccepted(payload)
        } else {
            ServerEvent::InvitationRejected(payload)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationPayload {
    pub invitation_id: i64,
    pub call_id: Uuid,
    pub inviter: String,
    pub call_type: CallType,
    pub room_name: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Invitation> for InvitationPayload {
    fn from(invitation: &Invitation) -> Self {
        Self {
            invitation_id: invitation.id,
            call_id: invitation.call_id,
            inviter: invitation.inviter_name.clone(),
            call_type: invitation.call_type,
            room_name: invitation.room_name.clone(),
            timestamp: invitation.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponsePayload {
    pub invitation_id: i64,
    pub call_id: Uuid,
    pub invitee: String,
    pub status: InvitationStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEventPayload {
    pub call_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl CallEventPayload {
    pub fn now(call_id: Uuid) -> Self {
        Self {
            call_id,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub scheduled_call: ScheduledCall,
    /// Threshold that fired, rendered like `15m0s`.
    pub reminder_time: String,
    pub reminder_seconds: u64,
}

impl ReminderPayload {
    pub fn new(scheduled_call: ScheduledCall, threshold: Duration) -> Self {
        Self {
            scheduled_call,
            reminder_time: format_threshold(threshold),
            reminder_seconds: threshold.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantAction {
    Removed,
    TrackMuted,
    TrackUnmuted,
    Updated,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStatePayload {
    pub room_name: String,
    pub participant_identity: String,
    pub action: ParticipantAction,
}

/// Frames a client may send over the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Authenticate { token: String },
    Ping,
}

fn format_threshold(threshold: Duration) -> String {
    let total = threshold.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
