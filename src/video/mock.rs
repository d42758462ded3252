//! In-memory video backend for service tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{ParticipantUpdate, RoomOptions, RoomProvision, VideoBackend};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationCall {
    Removed { room: String, identity: String },
    Muted { room: String, identity: String, track_sid: String, muted: bool },
    Updated { room: String, identity: String },
}

#[derive(Default)]
pub struct MockVideoBackend {
    rooms: Mutex<HashMap<String, RoomOptions>>,
    participants: Mutex<HashMap<String, Vec<String>>>,
    moderation: Mutex<Vec<ModerationCall>>,
    fail_create_room: AtomicBool,
    fail_list_participants: AtomicBool,
}

impl MockVideoBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create_room(&self, fail: bool) {
        self.fail_create_room.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list_participants(&self, fail: bool) {
        self.fail_list_participants.store(fail, Ordering::SeqCst);
    }

    pub fn set_participants(&self, room: &str, identities: &[&str]) {
        self.participants.lock().unwrap().insert(
            room.to_string(),
            identities.iter().map(|i| i.to_string()).collect(),
        );
    }

    pub fn room(&self, name: &str) -> Option<RoomOptions> {
        self.rooms.lock().unwrap().get(name).copied()
    }

    pub fn room_names(&self) -> HashSet<String> {
        self.rooms.lock().unwrap().keys().cloned().collect()
    }

    pub fn moderation_calls(&self) -> Vec<ModerationCall> {
        self.moderation.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoBackend for MockVideoBackend {
    async fn create_room(&self, name: &str, options: RoomOptions) -> AppResult<RoomProvision> {
        if self.fail_create_room.load(Ordering::SeqCst) {
            return Err(AppError::UpstreamFailure(anyhow::anyhow!("room service down")));
        }
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.contains_key(name) {
            return Ok(RoomProvision::AlreadyExists);
        }
        rooms.insert(name.to_string(), options);
        Ok(RoomProvision::Created)
    }

    async fn list_participants(&self, room: &str) -> AppResult<Vec<String>> {
        if self.fail_list_participants.load(Ordering::SeqCst) {
            return Err(AppError::UpstreamFailure(anyhow::anyhow!("room service down")));
        }
        Ok(self
            .participants
            .lock()
            .unwrap()
            .get(room)
            .cloned()
            .unwrap_or_default())
    }

    fn mint_join_credential(
        &self,
        room: &str,
        identity: &str,
        can_create: bool,
        ttl: Duration,
    ) -> AppResult<String> {
        Ok(format!("token:{}:{}:{}:{}", room, identity, can_create, ttl.as_secs()))
    }

    async fn remove_participant(&self, room: &str, identity: &str) -> AppResult<()> {
        self.moderation.lock().unwrap().push(ModerationCall::Removed {
            room: room.to_string(),
            identity: identity.to_string(),
        });
        Ok(())
    }

    async fn mute_track(
        &self,
        room: &str,
        identity: &str,
        track_sid: &str,
        muted: bool,
    ) -> AppResult<()> {
        self.moderation.lock().unwrap().push(ModerationCall::Muted {
            room: room.to_string(),
            identity: identity.to_string(),
            track_sid: track_sid.to_string(),
            muted,
        });
        Ok(())
    }

    async fn update_participant(
        &self,
        room: &str,
        identity: &str,
        _update: &ParticipantUpdate,
    ) -> AppResult<()> {
        self.moderation.lock().unwrap().push(ModerationCall::Updated {
            room: room.to_string(),
            identity: identity.to_string(),
        });
        Ok(())
    }
}
