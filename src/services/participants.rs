use anyhow::anyhow;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::calls::{Call, CallStatus};
use crate::models::websocket::{ParticipantAction, ParticipantStatePayload, ServerEvent};
use crate::repository::Repository;
use crate::video::{ParticipantUpdate, VideoBackend};
use crate::websocket::manager::ConnectionHub;

#[derive(Clone)]
pub struct ParticipantService {
    repo: Arc<dyn Repository>,
    video: Arc<dyn VideoBackend>,
    hub: ConnectionHub,
}

impl ParticipantService {
    pub fn new(repo: Arc<dyn Repository>, video: Arc<dyn VideoBackend>, hub: ConnectionHub) -> Self {
        Self { repo, video, hub }
    }

    async fn live_call(&self, call_id: Uuid) -> AppResult<Call> {
        let call = self
            .repo
            .get_call(call_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow!("Call not found")))?;
        if call.status != CallStatus::Active {
            return Err(AppError::InvalidState(anyhow!("Call is no longer active")));
        }
        Ok(call)
    }

    async fn moderated_call(&self, call_id: Uuid, actor_id: Uuid) -> AppResult<Call> {
        let call = self.live_call(call_id).await?;
        if call.created_by != actor_id {
            return Err(AppError::Forbidden(anyhow!(
                "Only the call creator can moderate participants"
            )));
        }
        Ok(call)
    }

    fn notify(&self, call: &Call, identity: &str, action: ParticipantAction) {
        self.hub.send(
            identity,
            ServerEvent::ParticipantStateChanged(ParticipantStatePayload {
                room_name: call.room_name.clone(),
                participant_identity: identity.to_string(),
                action,
            }),
        );
    }

    /// Visible to the creator and anyone invited to the call.
    pub async fn list_participants(&self, call_id: Uuid, user_id: Uuid) -> AppResult<Vec<String>> {
        let call = self.live_call(call_id).await?;
        if call.created_by != user_id {
            let invited = self
                .repo
                .invitations_for_call(call_id)
                .await?
                .iter()
                .any(|i| i.invitee_id == user_id);
            if !invited {
                return Err(AppError::Forbidden(anyhow!("Not a participant of this call")));
            }
        }
        self.video.list_participants(&call.room_name).await
    }

    pub async fn remove_participant(
        &self,
        call_id: Uuid,
        actor_id: Uuid,
        identity: &str,
    ) -> AppResult<()> {
        let call = self.moderated_call(call_id, actor_id).await?;
        self.video
            .remove_participant(&call.room_name, identity)
            .await?;
        self.notify(&call, identity, ParticipantAction::Removed);
        tracing::info!(%call_id, identity, "participant removed");
        Ok(())
    }

    pub async fn mute_track(
        &self,
        call_id: Uuid,
        actor_id: Uuid,
        identity: &str,
        track_sid: &str,
        muted: bool,
    ) -> AppResult<()> {
        if track_sid.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow!("Track id is required")));
        }
        let call = self.moderated_call(call_id, actor_id).await?;
        self.video
            .mute_track(&call.room_name, identity, track_sid, muted)
            .await?;
        let action = if muted {
            ParticipantAction::TrackMuted
        } else {
            ParticipantAction::TrackUnmuted
        };
        self.notify(&call, identity, action);
        tracing::info!(%call_id, identity, track_sid, muted, "participant track mute changed");
        Ok(())
    }

    pub async fn update_participant(
        &self,
        call_id: Uuid,
        actor_id: Uuid,
        identity: &str,
        update: &ParticipantUpdate,
    ) -> AppResult<()> {
        if update.metadata.is_none() && update.permission.is_none() {
            return Err(AppError::BadRequest(anyhow!("Nothing to update")));
        }
        let call = self.moderated_call(call_id, actor_id).await?;
        self.video
            .update_participant(&call.room_name, identity, update)
            .await?;
        self.notify(&call, identity, ParticipantAction::Updated);
        tracing::info!(%call_id, identity, "participant updated");
        Ok(())
    }
}
