use anyhow::anyhow;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::CallSettings;
use crate::error::{best_effort, AppError, AppResult};
use crate::models::calls::{
    Call, CallStatus, CallType, CreateCallResult, HistoryStatus, HistoryUpdate, Invitation,
    InvitationAction, InvitationStatus, JoinDetails, NewCall, NewCallHistory, NewInvitation,
};
use crate::models::users::User;
use crate::models::websocket::{CallEventPayload, InvitationPayload, ServerEvent};
use crate::repository::Repository;
use crate::video::{RoomOptions, RoomProvision, VideoBackend};
use crate::websocket::manager::ConnectionHub;

#[derive(Clone)]
pub struct CallService {
    repo: Arc<dyn Repository>,
    video: Arc<dyn VideoBackend>,
    hub: ConnectionHub,
    settings: CallSettings,
}

impl CallService {
    pub fn new(
        repo: Arc<dyn Repository>,
        video: Arc<dyn VideoBackend>,
        hub: ConnectionHub,
        settings: CallSettings,
    ) -> Self {
        Self {
            repo,
            video,
            hub,
            settings,
        }
    }

    async fn require_user(&self, user_id: Uuid) -> AppResult<User> {
        self.repo
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("User not found")))
    }

    pub(crate) async fn require_call(&self, call_id: Uuid) -> AppResult<Call> {
        self.repo
            .get_call(call_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Call not found")))
    }

    async fn provision_room(&self, room_name: &str, options: RoomOptions) -> AppResult<()> {
        match self.video.create_room(room_name, options).await? {
            RoomProvision::Created => {}
            RoomProvision::AlreadyExists => {
                tracing::debug!(room = room_name, "reusing existing room");
            }
        }
        Ok(())
    }

    fn join_credential(&self, room_name: &str, identity: &str) -> AppResult<String> {
        self.video
            .mint_join_credential(room_name, identity, true, self.settings.join_token_ttl)
    }

    /// Unknown usernames are skipped.
    pub async fn create_call_and_invite(
        &self,
        creator_id: Uuid,
        call_type: CallType,
        invitee_names: &[String],
        room_name: Option<String>,
    ) -> AppResult<CreateCallResult> {
        let creator = self.require_user(creator_id).await?;
        let call_id = Uuid::new_v4();
        let room_name = match room_name.filter(|name| !name.trim().is_empty()) {
            Some(name) => {
                // room names are unique across calls
                if self.repo.get_call_by_room(&name).await?.is_some() {
                    return Err(AppError::InvalidState(anyhow!(
                        "A call already exists for room {}",
                        name
                    )));
                }
                name
            }
            None => Uuid::new_v4().to_string(),
        };

        self.provision_room(
            &room_name,
            RoomOptions {
                empty_timeout_secs: self.settings.room_empty_timeout_secs,
                ..RoomOptions::default()
            },
        )
        .await?;

        let call = self
            .repo
            .create_call(NewCall {
                call_id,
                room_name: room_name.clone(),
                call_type,
                created_by: creator.id,
            })
            .await?;

        let mut invitations = Vec::new();
        for name in invitee_names {
            let invitee = match self.repo.get_user_by_username(name).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    tracing::debug!(invitee = %name, "skipping unknown invitee");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(invitee = %name, error = %e, "failed to resolve invitee");
                    continue;
                }
            };
            let created = self
                .repo
                .create_invitation(NewInvitation {
                    call_id,
                    inviter_id: creator.id,
                    invitee_id: invitee.id,
                    call_type,
                    room_name: room_name.clone(),
                })
                .await;
            if let Some(invitation) = best_effort("create_invitation", created) {
                invitations.push(invitation);
            }
        }

        let mut participants = vec![creator.username.clone()];
        participants.extend(invitee_names.iter().cloned());
        best_effort(
            "create_history",
            self.repo
                .create_history(NewCallHistory {
                    call_id,
                    room_name: room_name.clone(),
                    call_type,
                    created_by: creator.id,
                    participants,
                })
                .await,
        );

        for invitation in &invitations {
            self.hub.send(
                &invitation.invitee_name,
                ServerEvent::CallInvitation(InvitationPayload::from(invitation)),
            );
        }

        let token = self.join_credential(&room_name, &creator.username)?;
        tracing::info!(
            call_id = %call.call_id,
            room = %room_name,
            creator = %creator.username,
            invited = invitations.len(),
            "call created"
        );

        Ok(CreateCallResult {
            call_id,
            room_name,
            token,
        })
    }

    pub async fn respond_to_invitation(
        &self,
        invitation_id: i64,
        user_id: Uuid,
        action: InvitationAction,
    ) -> AppResult<Option<JoinDetails>> {
        let invitation = self
            .repo
            .get_invitation(invitation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Invitation not found")))?;

        if invitation.invitee_id != user_id {
            return Err(AppError::Forbidden(anyhow!(
                "Only the invitee can respond to this invitation"
            )));
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(AppError::InvalidState(anyhow!("Invitation already responded")));
        }

        let status = match action {
            InvitationAction::Accept => InvitationStatus::Accepted,
            InvitationAction::Reject => InvitationStatus::Rejected,
        };
        let moved = self
            .repo
            .transition_invitation(invitation_id, InvitationStatus::Pending, status, Utc::now())
            .await?;
        if !moved {
            return Err(AppError::InvalidState(anyhow!("Invitation already responded")));
        }

        let details = match action {
            InvitationAction::Reject => {
                best_effort(
                    "update_history",
                    self.repo
                        .update_history(
                            invitation.call_id,
                            HistoryUpdate {
                                ended_at: Some(Utc::now()),
                                duration_seconds: 0,
                                status: HistoryStatus::Rejected,
                            },
                        )
                        .await,
                );
                None
            }
            InvitationAction::Accept => {
                let token = self.join_credential(&invitation.room_name, &invitation.invitee_name)?;
                Some(JoinDetails {
                    token,
                    room_name: invitation.room_name.clone(),
                })
            }
        };

        self.hub.send(
            &invitation.inviter_name,
            ServerEvent::invitation_response(&invitation, status),
        );
        tracing::info!(
            invitation_id,
            call_id = %invitation.call_id,
            invitee = %invitation.invitee_name,
            ?status,
            "invitation answered"
        );

        Ok(details)
    }

    pub async fn end_call(&self, call_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let call = self.require_call(call_id).await?;

        let participants = best_effort(
            "list_participants",
            self.video.list_participants(&call.room_name).await,
        )
        .unwrap_or_default();

        let ended_at = Utc::now();
        let duration_seconds = (ended_at - call.created_at).num_seconds().max(0);

        let existing = best_effort("get_history", self.repo.get_history(call_id).await).flatten();
        if existing.is_none() {
            best_effort(
                "create_history",
                self.repo
                    .create_history(NewCallHistory {
                        call_id,
                        room_name: call.room_name.clone(),
                        call_type: call.call_type,
                        created_by: call.created_by,
                        participants: participants.clone(),
                    })
                    .await,
            );
        }
        best_effort(
            "update_history",
            self.repo
                .update_history(
                    call_id,
                    HistoryUpdate {
                        ended_at: Some(ended_at),
                        duration_seconds,
                        status: HistoryStatus::Completed,
                    },
                )
                .await,
        );

        let moved = self
            .repo
            .transition_call(call_id, CallStatus::Active, CallStatus::Ended, Some(ended_at))
            .await?;
        if !moved {
            tracing::warn!(%call_id, status = ?call.status, "call was not active, status left unchanged");
        }

        let event = ServerEvent::CallEnded(CallEventPayload::now(call_id));
        self.hub
            .send_to_all(participants.iter().map(String::as_str), &event);

        if let Some(history) = best_effort("get_history", self.repo.get_history(call_id).await).flatten()
        {
            if let Some(creator) =
                best_effort("get_user", self.repo.get_user_by_id(call.created_by).await).flatten()
            {
                self.hub
                    .send(&creator.username, ServerEvent::CallHistoryUpdated(history));
            }
        }

        tracing::info!(%call_id, ended_by = %user_id, duration_seconds, "call ended");
        Ok(())
    }

    /// Creator-only.
    pub async fn cancel_call(&self, call_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let call = self.require_call(call_id).await?;
        if call.created_by != user_id {
            return Err(AppError::Forbidden(anyhow!(
                "Only the creator can cancel the call"
            )));
        }

        let moved = self
            .repo
            .transition_call(call_id, CallStatus::Active, CallStatus::Cancelled, None)
            .await?;
        if !moved {
            return Err(AppError::InvalidState(anyhow!("Call is no longer active")));
        }

        let invitations = self.repo.invitations_for_call(call_id).await?;
        let now = Utc::now();
        let mut cancelled: Vec<Invitation> = Vec::new();
        for invitation in invitations
            .into_iter()
            .filter(|i| i.status == InvitationStatus::Pending)
        {
            let result = self
                .repo
                .transition_invitation(
                    invitation.id,
                    InvitationStatus::Pending,
                    InvitationStatus::Cancelled,
                    now,
                )
                .await;
            match best_effort("cancel_invitation", result) {
                Some(true) => cancelled.push(invitation),
                Some(false) => {
                    tracing::debug!(invitation_id = invitation.id, "invitation answered before cancel");
                }
                None => {}
            }
        }

        best_effort(
            "update_history",
            self.repo
                .update_history(
                    call_id,
                    HistoryUpdate {
                        ended_at: None,
                        duration_seconds: 0,
                        status: HistoryStatus::Cancelled,
                    },
                )
                .await,
        );

        let event = ServerEvent::CallCancelled(CallEventPayload::now(call_id));
        self.hub
            .send_to_all(cancelled.iter().map(|i| i.invitee_name.as_str()), &event);

        tracing::info!(%call_id, cancelled_invitations = cancelled.len(), "call cancelled");
        Ok(())
    }

    pub async fn create_room_for_scheduled_call(
        &self,
        room_name: &str,
        max_participants: i32,
        max_duration_seconds: i64,
    ) -> AppResult<()> {
        self.provision_room(
            room_name,
            RoomOptions {
                empty_timeout_secs: self.settings.room_empty_timeout_secs,
                max_participants: u32::try_from(max_participants).unwrap_or(0),
                max_duration_secs: u32::try_from(max_duration_seconds).unwrap_or(0),
            },
        )
        .await
    }

    pub async fn pending_invitations(&self, user_id: Uuid) -> AppResult<Vec<Invitation>> {
        self.repo.pending_invitations_for_user(user_id).await
    }

    pub(crate) fn mint_join_credential(&self, room_name: &str, identity: &str) -> AppResult<String> {
        self.join_credential(room_name, identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{drain, event_types, Harness};

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn create_call_invites_resolvable_users() {
        let h = Harness::new();
        let (alice, _alice_rx) = h.connected_user("alice").await;
        let (bob, mut bob_rx) = h.connected_user("bob").await;

        let result = h
            .calls
            .create_call_and_invite(alice.id, CallType::Video, &names(&["bob", "ghost"]), None)
            .await
            .unwrap();

        assert!(!result.room_name.is_empty());
        assert!(h.video.room(&result.room_name).is_some());
        assert!(result.token.contains(":alice:"));

        let pending = h.calls.pending_invitations(bob.id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].call_id, result.call_id);
        assert_eq!(pending[0].status, InvitationStatus::Pending);

        let events = drain(&mut bob_rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ServerEvent::CallInvitation(p) if p.call_id == result.call_id));

        let history = h.repo.get_history(result.call_id).await.unwrap().unwrap();
        assert_eq!(history.status, HistoryStatus::Pending);
        assert_eq!(history.participants.0, names(&["alice", "bob", "ghost"]));
    }

    #[tokio::test]
    async fn create_call_reuses_existing_room() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        h.video
            .create_room("standup", RoomOptions::default())
            .await
            .unwrap();

        let result = h
            .calls
            .create_call_and_invite(alice.id, CallType::Voice, &[], Some("standup".to_string()))
            .await
            .unwrap();
        assert_eq!(result.room_name, "standup");
    }

    #[tokio::test]
    async fn room_with_existing_call_is_invalid_state() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        h.calls
            .create_call_and_invite(alice.id, CallType::Video, &[], Some("daily".to_string()))
            .await
            .unwrap();

        let err = h
            .calls
            .create_call_and_invite(bob.id, CallType::Video, &[], Some("daily".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(h.repo.list_active_calls().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn room_provisioning_failure_aborts_creation() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        h.video.fail_create_room(true);

        let err = h
            .calls
            .create_call_and_invite(alice.id, CallType::Video, &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamFailure(_)));
        assert!(h.repo.list_active_calls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_creator_is_not_found() {
        let h = Harness::new();
        let err = h
            .calls
            .create_call_and_invite(Uuid::new_v4(), CallType::Video, &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn reject_updates_history_and_notifies_inviter_once() {
        let h = Harness::new();
        let (alice, mut alice_rx) = h.connected_user("alice").await;
        let bob = h.user("bob").await;
        let result = h
            .calls
            .create_call_and_invite(alice.id, CallType::Video, &names(&["bob"]), None)
            .await
            .unwrap();
        let invitation = h.calls.pending_invitations(bob.id).await.unwrap().remove(0);

        let details = h
            .calls
            .respond_to_invitation(invitation.id, bob.id, InvitationAction::Reject)
            .await
            .unwrap();
        assert!(details.is_none());

        let stored = h.repo.get_invitation(invitation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvitationStatus::Rejected);
        assert!(stored.responded_at.is_some());
        let history = h.repo.get_history(result.call_id).await.unwrap().unwrap();
        assert_eq!(history.status, HistoryStatus::Rejected);
        assert_eq!(event_types(&mut alice_rx), vec!["invitation_rejected"]);

        let second = h
            .calls
            .respond_to_invitation(invitation.id, bob.id, InvitationAction::Reject)
            .await;
        assert!(matches!(second, Err(AppError::InvalidState(_))));
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[tokio::test]
    async fn accept_returns_join_details() {
        let h = Harness::new();
        let (alice, mut alice_rx) = h.connected_user("alice").await;
        let bob = h.user("bob").await;
        let result = h
            .calls
            .create_call_and_invite(alice.id, CallType::Video, &names(&["bob"]), None)
            .await
            .unwrap();
        let invitation = h.calls.pending_invitations(bob.id).await.unwrap().remove(0);

        let details = h
            .calls
            .respond_to_invitation(invitation.id, bob.id, InvitationAction::Accept)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.room_name, result.room_name);
        assert!(details.token.contains(":bob:"));
        assert_eq!(event_types(&mut alice_rx), vec!["invitation_accepted"]);

        let reject_after_accept = h
            .calls
            .respond_to_invitation(invitation.id, bob.id, InvitationAction::Reject)
            .await;
        assert!(matches!(reject_after_accept, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn only_invitee_may_respond() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        h.calls
            .create_call_and_invite(alice.id, CallType::Voice, &names(&["bob"]), None)
            .await
            .unwrap();
        let invitation = h.calls.pending_invitations(bob.id).await.unwrap().remove(0);

        let err = h
            .calls
            .respond_to_invitation(invitation.id, alice.id, InvitationAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let missing = h
            .calls
            .respond_to_invitation(9999, bob.id, InvitationAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn responding_without_connections_still_succeeds() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        h.calls
            .create_call_and_invite(alice.id, CallType::Voice, &names(&["bob"]), None)
            .await
            .unwrap();
        let invitation = h.calls.pending_invitations(bob.id).await.unwrap().remove(0);

        assert!(h
            .calls
            .respond_to_invitation(invitation.id, bob.id, InvitationAction::Accept)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn cancel_cancels_only_pending_invitations() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let (bob, mut bob_rx) = h.connected_user("bob").await;
        let (carol, mut carol_rx) = h.connected_user("carol").await;
        let result = h
            .calls
            .create_call_and_invite(alice.id, CallType::Video, &names(&["bob", "carol"]), None)
            .await
            .unwrap();
        let carol_invitation = h.calls.pending_invitations(carol.id).await.unwrap().remove(0);
        h.calls
            .respond_to_invitation(carol_invitation.id, carol.id, InvitationAction::Accept)
            .await
            .unwrap();
        drain(&mut bob_rx);
        drain(&mut carol_rx);

        h.calls.cancel_call(result.call_id, alice.id).await.unwrap();

        let invitations = h.repo.invitations_for_call(result.call_id).await.unwrap();
        let status_of = |id: Uuid| invitations.iter().find(|i| i.invitee_id == id).unwrap().status;
        assert_eq!(status_of(bob.id), InvitationStatus::Cancelled);
        assert_eq!(status_of(carol.id), InvitationStatus::Accepted);

        let call = h.repo.get_call(result.call_id).await.unwrap().unwrap();
        assert_eq!(call.status, CallStatus::Cancelled);
        let history = h.repo.get_history(result.call_id).await.unwrap().unwrap();
        assert_eq!(history.status, HistoryStatus::Cancelled);
        assert!(history.ended_at.is_none());

        assert_eq!(event_types(&mut bob_rx), vec!["call_cancelled"]);
        assert!(drain(&mut carol_rx).is_empty());
    }

    #[tokio::test]
    async fn only_creator_may_cancel() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let result = h
            .calls
            .create_call_and_invite(alice.id, CallType::Video, &names(&["bob"]), None)
            .await
            .unwrap();

        let err = h.calls.cancel_call(result.call_id, bob.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let missing = h.calls.cancel_call(Uuid::new_v4(), alice.id).await.unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn end_after_cancel_keeps_cancelled_status() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        h.user("bob").await;
        let result = h
            .calls
            .create_call_and_invite(alice.id, CallType::Video, &names(&["bob"]), None)
            .await
            .unwrap();
        h.calls.cancel_call(result.call_id, alice.id).await.unwrap();

        h.calls.end_call(result.call_id, alice.id).await.unwrap();

        let call = h.repo.get_call(result.call_id).await.unwrap().unwrap();
        assert_eq!(call.status, CallStatus::Cancelled);
        assert!(call.ended_at.is_none());

        let history = h.repo.get_history(result.call_id).await.unwrap().unwrap();
        assert_eq!(history.status, HistoryStatus::Completed);
        let since_creation = (Utc::now() - call.created_at).num_seconds();
        assert!(history.duration_seconds <= since_creation);
        assert!(history.ended_at.is_some());

        let again = h.calls.cancel_call(result.call_id, alice.id).await;
        assert!(matches!(again, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn end_notifies_room_participants_and_creator() {
        let h = Harness::new();
        let (alice, mut alice_rx) = h.connected_user("alice").await;
        let (_bob, mut bob_rx) = h.connected_user("bob").await;
        let result = h
            .calls
            .create_call_and_invite(alice.id, CallType::Video, &[], None)
            .await
            .unwrap();
        h.video.set_participants(&result.room_name, &["alice", "bob"]);

        h.calls.end_call(result.call_id, alice.id).await.unwrap();

        let call = h.repo.get_call(result.call_id).await.unwrap().unwrap();
        assert_eq!(call.status, CallStatus::Ended);
        assert!(call.ended_at.is_some());
        assert_eq!(event_types(&mut bob_rx), vec!["call_ended"]);
        assert_eq!(
            event_types(&mut alice_rx),
            vec!["call_ended", "call_history_updated"]
        );
    }

    #[tokio::test]
    async fn end_treats_participant_failure_as_empty_room() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let (_bob, mut bob_rx) = h.connected_user("bob").await;
        let result = h
            .calls
            .create_call_and_invite(alice.id, CallType::Video, &[], None)
            .await
            .unwrap();
        h.video.set_participants(&result.room_name, &["bob"]);
        h.video.fail_list_participants(true);

        h.calls.end_call(result.call_id, alice.id).await.unwrap();

        let call = h.repo.get_call(result.call_id).await.unwrap().unwrap();
        assert_eq!(call.status, CallStatus::Ended);
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn end_unknown_call_is_not_found() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let err = h.calls.end_call(Uuid::new_v4(), alice.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
