use anyhow::anyhow;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{CallService, CallSettings};
use crate::error::{best_effort, AppError, AppResult};
use crate::models::calls::{CreateCallResult, InvitationAction};
use crate::models::scheduled::{
    CreateScheduledCallRequest, NewScheduledCall, RsvpStatus, ScheduledCall, ScheduledCallStatus,
    ScheduledCallUpdate, DEFAULT_TIMEZONE,
};
use crate::models::websocket::ServerEvent;
use crate::repository::Repository;
use crate::websocket::manager::ConnectionHub;

pub fn join_link(call_id: Uuid) -> String {
    format!("app://call/join?callId={}", call_id)
}

#[derive(Clone)]
pub struct ScheduledService {
    repo: Arc<dyn Repository>,
    calls: CallService,
    hub: ConnectionHub,
    settings: CallSettings,
}

impl ScheduledService {
    pub fn new(
        repo: Arc<dyn Repository>,
        calls: CallService,
        hub: ConnectionHub,
        settings: CallSettings,
    ) -> Self {
        Self {
            repo,
            calls,
            hub,
            settings,
        }
    }

    async fn require_scheduled_call(&self, id: i64) -> AppResult<ScheduledCall> {
        self.repo
            .get_scheduled_call(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Scheduled call not found")))
    }

    async fn populate_invitees(&self, call: &mut ScheduledCall) {
        let Some(invitations) = best_effort(
            "scheduled_invitations",
            self.repo.scheduled_invitations(call.id).await,
        ) else {
            return;
        };
        let mut invitees = Vec::with_capacity(invitations.len());
        for invitation in invitations {
            if let Some(Some(user)) = best_effort(
                "get_user",
                self.repo.get_user_by_id(invitation.invitee_id).await,
            ) {
                invitees.push(user.username);
            }
        }
        call.invitees = invitees;
    }

    pub async fn create_scheduled_call(
        &self,
        creator_id: Uuid,
        request: CreateScheduledCallRequest,
    ) -> AppResult<ScheduledCall> {
        request
            .validate()
            .map_err(|e| AppError::BadRequest(anyhow!("Invalid scheduled call: {}", e)))?;
        if request.scheduled_at <= Utc::now() {
            return Err(AppError::BadRequest(anyhow!(
                "Scheduled time must be in the future"
            )));
        }

        let creator = self
            .repo
            .get_user_by_id(creator_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("User not found")))?;

        let call_id = Uuid::new_v4();
        let max_participants = if request.max_participants > 0 {
            request.max_participants
        } else {
            i32::try_from(self.settings.default_max_participants).unwrap_or(i32::MAX)
        };
        let new_call = NewScheduledCall {
            call_id,
            room_name: Uuid::new_v4().to_string(),
            call_type: request.call_type,
            created_by: creator.id,
            scheduled_at: request.scheduled_at,
            timezone: request
                .timezone
                .filter(|tz| !tz.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            recurrence: request
                .recurrence
                .filter(|r| !r.is_null())
                .unwrap_or_else(|| serde_json::json!({"type": "none"})),
            title: request.title,
            description: request.description,
            join_link: join_link(call_id),
            max_participants,
            max_duration_seconds: request.max_duration_seconds.max(0),
        };

        let mut call = self.repo.create_scheduled_call(new_call).await?;

        let mut invitees = Vec::new();
        for name in &request.invitees {
            let Some(Some(invitee)) = best_effort(
                "get_user_by_username",
                self.repo.get_user_by_username(name).await,
            ) else {
                tracing::debug!(invitee = %name, "skipping unknown invitee");
                continue;
            };
            let created = self
                .repo
                .create_scheduled_invitation(call.id, invitee.id)
                .await;
            if best_effort("create_scheduled_invitation", created).is_some() {
                invitees.push(invitee.username);
            }
        }
        call.invitees = invitees;

        let event = ServerEvent::ScheduledCallCreated(call.clone());
        self.hub.send(&creator.username, event.clone());
        self.hub
            .send_to_all(call.invitees.iter().map(String::as_str), &event);

        tracing::info!(
            scheduled_call_id = call.id,
            creator = %creator.username,
            scheduled_at = %call.scheduled_at,
            invitees = call.invitees.len(),
            "scheduled call created"
        );
        Ok(call)
    }

    pub async fn get_scheduled_calls(
        &self,
        user_id: Uuid,
        status: Option<ScheduledCallStatus>,
    ) -> AppResult<Vec<ScheduledCall>> {
        let created = self.repo.scheduled_calls_by_creator(user_id, status).await?;
        let invited = self.repo.scheduled_calls_by_invitee(user_id, status).await?;

        let mut by_id: BTreeMap<i64, ScheduledCall> = BTreeMap::new();
        for call in created.into_iter().chain(invited) {
            by_id.entry(call.id).or_insert(call);
        }

        let mut calls: Vec<ScheduledCall> = by_id.into_values().collect();
        calls.sort_by_key(|c| c.scheduled_at);
        for call in &mut calls {
            self.populate_invitees(call).await;
        }
        Ok(calls)
    }

    /// Visible to the creator and invitees only.
    pub async fn get_scheduled_call(&self, id: i64, user_id: Uuid) -> AppResult<ScheduledCall> {
        let mut call = self.require_scheduled_call(id).await?;
        if call.created_by != user_id && !self.is_invitee(id, user_id).await? {
            return Err(AppError::Forbidden(anyhow!(
                "Not a participant of this scheduled call"
            )));
        }
        self.populate_invitees(&mut call).await;
        Ok(call)
    }

    pub async fn update_scheduled_call(
        &self,
        id: i64,
        user_id: Uuid,
        update: ScheduledCallUpdate,
    ) -> AppResult<ScheduledCall> {
        update
            .validate()
            .map_err(|e| AppError::BadRequest(anyhow!("Invalid update: {}", e)))?;
        let call = self.require_scheduled_call(id).await?;
        if call.created_by != user_id {
            return Err(AppError::Forbidden(anyhow!(
                "Only the creator can update the scheduled call"
            )));
        }
        if call.status != ScheduledCallStatus::Scheduled {
            return Err(AppError::InvalidState(anyhow!(
                "Scheduled call is {:?}",
                call.status
            )));
        }
        if matches!(update.scheduled_at, Some(at) if at <= Utc::now()) {
            return Err(AppError::BadRequest(anyhow!(
                "Scheduled time must be in the future"
            )));
        }

        if !self.repo.update_scheduled_call(id, &update).await? {
            return Err(AppError::InvalidState(anyhow!(
                "Scheduled call is no longer scheduled"
            )));
        }

        let mut updated = self.require_scheduled_call(id).await?;
        self.populate_invitees(&mut updated).await;
        tracing::info!(scheduled_call_id = id, "scheduled call updated");
        Ok(updated)
    }

    pub async fn cancel_scheduled_call(&self, id: i64, user_id: Uuid) -> AppResult<()> {
        let call = self.require_scheduled_call(id).await?;
        if call.created_by != user_id {
            return Err(AppError::Forbidden(anyhow!(
                "Only the creator can cancel the scheduled call"
            )));
        }

        let moved = self
            .repo
            .transition_scheduled_call(
                id,
                ScheduledCallStatus::Scheduled,
                ScheduledCallStatus::Cancelled,
            )
            .await?;
        if !moved {
            return Err(AppError::InvalidState(anyhow!(
                "Scheduled call is no longer scheduled"
            )));
        }
        tracing::info!(scheduled_call_id = id, "scheduled call cancelled");
        Ok(())
    }

    /// The creator or any invitee may start, early starts included.
    pub async fn start_scheduled_call(&self, id: i64, user_id: Uuid) -> AppResult<CreateCallResult> {
        let mut call = self.require_scheduled_call(id).await?;
        if call.created_by != user_id && !self.is_invitee(id, user_id).await? {
            return Err(AppError::Forbidden(anyhow!(
                "Only the creator or an invitee can start the scheduled call"
            )));
        }
        if call.status != ScheduledCallStatus::Scheduled {
            return Err(AppError::InvalidState(anyhow!(
                "Scheduled call is not in scheduled status"
            )));
        }
        if matches!(call.window_end(), Some(end) if Utc::now() > end) {
            return Err(AppError::Expired(anyhow!("Scheduled call has ended")));
        }

        self.calls
            .create_room_for_scheduled_call(
                &call.room_name,
                call.max_participants,
                call.max_duration_seconds,
            )
            .await?;
        let mut result = self
            .calls
            .create_call_and_invite(call.created_by, call.call_type, &[], Some(call.room_name.clone()))
            .await?;

        let moved = self
            .repo
            .transition_scheduled_call(
                id,
                ScheduledCallStatus::Scheduled,
                ScheduledCallStatus::Started,
            )
            .await?;
        if !moved {
            tracing::warn!(
                scheduled_call_id = id,
                call_id = %result.call_id,
                "scheduled call left scheduled status while starting"
            );
            return Err(AppError::InvalidState(anyhow!(
                "Scheduled call is not in scheduled status"
            )));
        }

        if user_id != call.created_by {
            let starter = self
                .repo
                .get_user_by_id(user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow!("User not found")))?;
            result.token = self
                .calls
                .mint_join_credential(&result.room_name, &starter.username)?;
        }

        call.status = ScheduledCallStatus::Started;
        self.populate_invitees(&mut call).await;
        let event = ServerEvent::ScheduledCallStarting(call.clone());
        if let Some(Some(creator)) =
            best_effort("get_user", self.repo.get_user_by_id(call.created_by).await)
        {
            self.hub.send(&creator.username, event.clone());
        }
        self.hub
            .send_to_all(call.invitees.iter().map(String::as_str), &event);

        tracing::info!(
            scheduled_call_id = id,
            call_id = %result.call_id,
            started_by = %user_id,
            "scheduled call started"
        );
        Ok(result)
    }

    pub async fn respond_to_scheduled_invitation(
        &self,
        id: i64,
        user_id: Uuid,
        action: InvitationAction,
    ) -> AppResult<()> {
        self.require_scheduled_call(id).await?;
        if !self.is_invitee(id, user_id).await? {
            return Err(AppError::Forbidden(anyhow!(
                "Not invited to this scheduled call"
            )));
        }

        let status = match action {
            InvitationAction::Accept => RsvpStatus::Accepted,
            InvitationAction::Reject => RsvpStatus::Rejected,
        };
        let moved = self
            .repo
            .transition_scheduled_invitation(id, user_id, RsvpStatus::Pending, status)
            .await?;
        if !moved {
            return Err(AppError::InvalidState(anyhow!("Invitation already responded")));
        }
        tracing::info!(scheduled_call_id = id, %user_id, ?status, "scheduled invitation answered");
        Ok(())
    }

    pub async fn is_invitee(&self, id: i64, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .repo
            .scheduled_invitations(id)
            .await?
            .iter()
            .any(|i| i.invitee_id == user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calls::{CallStatus, CallType};
    use crate::services::testing::{drain, event_types, Harness};
    use chrono::{DateTime, Duration};

    fn request(at: DateTime<Utc>, invitees: &[&str]) -> CreateScheduledCallRequest {
        CreateScheduledCallRequest {
            call_type: CallType::Video,
            scheduled_at: at,
            timezone: None,
            invitees: invitees.iter().map(|i| i.to_string()).collect(),
            recurrence: None,
            title: Some("Standup".to_string()),
            description: None,
            max_participants: 0,
            max_duration_seconds: -5,
        }
    }

    #[tokio::test]
    async fn create_applies_defaults_and_notifies() {
        let h = Harness::new();
        let (alice, mut alice_rx) = h.connected_user("alice").await;
        let (_bob, mut bob_rx) = h.connected_user("bob").await;
        let service = h.scheduled();

        let call = service
            .create_scheduled_call(
                alice.id,
                request(Utc::now() + Duration::hours(1), &["bob", "ghost"]),
            )
            .await
            .unwrap();

        assert_eq!(call.status, ScheduledCallStatus::Scheduled);
        assert_eq!(call.timezone, "UTC");
        assert_eq!(call.recurrence.0, serde_json::json!({"type": "none"}));
        assert_eq!(call.max_participants, 20);
        assert_eq!(call.max_duration_seconds, 0);
        assert_eq!(call.join_link, format!("app://call/join?callId={}", call.call_id));
        assert_eq!(call.invitees, vec!["bob".to_string()]);

        assert_eq!(event_types(&mut alice_rx), vec!["scheduled_call_created"]);
        assert_eq!(event_types(&mut bob_rx), vec!["scheduled_call_created"]);
    }

    #[tokio::test]
    async fn create_rejects_past_time() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let err = h
            .scheduled()
            .create_scheduled_call(alice.id, request(Utc::now() - Duration::minutes(1), &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn listing_merges_created_and_invited_sorted_by_time() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let service = h.scheduled();
        let now = Utc::now();

        let late = service
            .create_scheduled_call(alice.id, request(now + Duration::hours(3), &["bob"]))
            .await
            .unwrap();
        let early = service
            .create_scheduled_call(bob.id, request(now + Duration::hours(1), &["bob"]))
            .await
            .unwrap();
        let middle = service
            .create_scheduled_call(alice.id, request(now + Duration::hours(2), &[]))
            .await
            .unwrap();

        let bobs = service.get_scheduled_calls(bob.id, None).await.unwrap();
        assert_eq!(
            bobs.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![early.id, late.id]
        );
        assert_eq!(bobs[1].invitees, vec!["bob".to_string()]);

        let alices = service
            .get_scheduled_calls(alice.id, Some(ScheduledCallStatus::Scheduled))
            .await
            .unwrap();
        assert_eq!(
            alices.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![middle.id, late.id]
        );
    }

    #[tokio::test]
    async fn cancel_is_creator_only_and_terminal() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let service = h.scheduled();
        let call = service
            .create_scheduled_call(alice.id, request(Utc::now() + Duration::hours(1), &["bob"]))
            .await
            .unwrap();

        let err = service.cancel_scheduled_call(call.id, bob.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        service.cancel_scheduled_call(call.id, alice.id).await.unwrap();
        let again = service.cancel_scheduled_call(call.id, alice.id).await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));

        let start = service.start_scheduled_call(call.id, alice.id).await;
        assert!(matches!(start, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn start_by_stranger_is_rejected() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        h.user("bob").await;
        let mallory = h.user("mallory").await;
        let service = h.scheduled();
        let call = service
            .create_scheduled_call(alice.id, request(Utc::now() + Duration::hours(1), &["bob"]))
            .await
            .unwrap();

        let err = service.start_scheduled_call(call.id, mallory.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let missing = service.start_scheduled_call(9999, alice.id).await.unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn invitee_can_start_early() {
        let h = Harness::new();
        let (alice, mut alice_rx) = h.connected_user("alice").await;
        let (bob, mut bob_rx) = h.connected_user("bob").await;
        let service = h.scheduled();
        let mut req = request(Utc::now() + Duration::hours(1), &["bob"]);
        req.max_participants = 4;
        req.max_duration_seconds = 1800;
        let call = service.create_scheduled_call(alice.id, req).await.unwrap();
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let result = service.start_scheduled_call(call.id, bob.id).await.unwrap();

        assert_eq!(result.room_name, call.room_name);
        assert!(result.token.contains(":bob:"));
        let room = h.video.room(&call.room_name).unwrap();
        assert_eq!(room.max_participants, 4);
        assert_eq!(room.max_duration_secs, 1800);

        let live = h.repo.get_call(result.call_id).await.unwrap().unwrap();
        assert_eq!(live.status, CallStatus::Active);
        assert_eq!(live.created_by, alice.id);

        let stored = h.repo.get_scheduled_call(call.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduledCallStatus::Started);
        assert_eq!(event_types(&mut alice_rx), vec!["scheduled_call_starting"]);
        assert_eq!(event_types(&mut bob_rx), vec!["scheduled_call_starting"]);

        let twice = service.start_scheduled_call(call.id, alice.id).await;
        assert!(matches!(twice, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn start_when_room_already_has_call_is_invalid_state() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let service = h.scheduled();
        let call = service
            .create_scheduled_call(alice.id, request(Utc::now() + Duration::hours(1), &[]))
            .await
            .unwrap();
        h.calls
            .create_call_and_invite(alice.id, CallType::Video, &[], Some(call.room_name.clone()))
            .await
            .unwrap();

        let err = service
            .start_scheduled_call(call.id, alice.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        let stored = h.repo.get_scheduled_call(call.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduledCallStatus::Scheduled);
    }

    #[tokio::test]
    async fn start_after_window_is_expired() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let call_id = Uuid::new_v4();
        let call = h
            .repo
            .create_scheduled_call(NewScheduledCall {
                call_id,
                room_name: "past-room".to_string(),
                call_type: CallType::Voice,
                created_by: alice.id,
                scheduled_at: Utc::now() - Duration::hours(2),
                timezone: DEFAULT_TIMEZONE.to_string(),
                recurrence: serde_json::json!({"type": "none"}),
                title: None,
                description: None,
                join_link: join_link(call_id),
                max_participants: 20,
                max_duration_seconds: 3600,
            })
            .await
            .unwrap();

        let err = h
            .scheduled()
            .start_scheduled_call(call.id, alice.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));
        assert!(h.video.room("past-room").is_none());
    }

    #[tokio::test]
    async fn rsvp_once_per_invitee() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let service = h.scheduled();
        let call = service
            .create_scheduled_call(alice.id, request(Utc::now() + Duration::hours(1), &["bob"]))
            .await
            .unwrap();

        service
            .respond_to_scheduled_invitation(call.id, bob.id, InvitationAction::Accept)
            .await
            .unwrap();
        let again = service
            .respond_to_scheduled_invitation(call.id, bob.id, InvitationAction::Reject)
            .await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));

        let stranger = service
            .respond_to_scheduled_invitation(call.id, alice.id, InvitationAction::Accept)
            .await;
        assert!(matches!(stranger, Err(AppError::Forbidden(_))));

        // Answered invitees still count as invitees.
        assert!(service.is_invitee(call.id, bob.id).await.unwrap());
        assert!(!service.is_invitee(call.id, alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_is_creator_only_and_rearms_reminder() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let service = h.scheduled();
        let call = service
            .create_scheduled_call(alice.id, request(Utc::now() + Duration::hours(1), &["bob"]))
            .await
            .unwrap();
        h.repo.mark_reminder_sent(call.id, Utc::now()).await.unwrap();

        let forbidden = service
            .update_scheduled_call(call.id, bob.id, ScheduledCallUpdate::default())
            .await;
        assert!(matches!(forbidden, Err(AppError::Forbidden(_))));

        let past = ScheduledCallUpdate {
            scheduled_at: Some(Utc::now() - Duration::minutes(1)),
            ..Default::default()
        };
        assert!(matches!(
            service.update_scheduled_call(call.id, alice.id, past).await,
            Err(AppError::BadRequest(_))
        ));

        let new_time = Utc::now() + Duration::hours(5);
        let updated = service
            .update_scheduled_call(
                call.id,
                alice.id,
                ScheduledCallUpdate {
                    title: Some("Retro".to_string()),
                    description: None,
                    scheduled_at: Some(new_time),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title.as_deref(), Some("Retro"));
        assert_eq!(updated.scheduled_at, new_time);
        assert!(updated.reminder_sent_at.is_none());
        assert_eq!(updated.invitees, vec!["bob".to_string()]);

        let viewed = service.get_scheduled_call(call.id, bob.id).await.unwrap();
        assert_eq!(viewed.title.as_deref(), Some("Retro"));
        let mallory = h.user("mallory").await;
        assert!(matches!(
            service.get_scheduled_call(call.id, mallory.id).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
