//! External video infrastructure: room provisioning, participant moderation
//! and join credentials.

pub mod livekit;
#[cfg(test)]
pub mod mock;

pub use livekit::LiveKitClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomOptions {
    /// Seconds an empty room is kept before the backend closes it; 0 uses the backend default.
    pub empty_timeout_secs: u32,
    /// 0 means unlimited.
    pub max_participants: u32,
    /// Scheduled duration limit, published as room metadata. 0 means none.
    pub max_duration_secs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomProvision {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPermission {
    pub can_subscribe: bool,
    pub can_publish: bool,
    pub can_publish_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantUpdate {
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub permission: Option<ParticipantPermission>,
}

#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Provisions a room. An existing room with the same name is not an error.
    async fn create_room(&self, name: &str, options: RoomOptions) -> AppResult<RoomProvision>;

    /// Identities currently connected to the room.
    async fn list_participants(&self, room: &str) -> AppResult<Vec<String>>;

    fn mint_join_credential(
        &self,
        room: &str,
        identity: &str,
        can_create: bool,
        ttl: Duration,
    ) -> AppResult<String>;

    async fn remove_participant(&self, room: &str, identity: &str) -> AppResult<()>;

    async fn mute_track(
        &self,
        room: &str,
        identity: &str,
        track_sid: &str,
        muted: bool,
    ) -> AppResult<()>;

    async fn update_participant(
        &self,
        room: &str,
        identity: &str,
        update: &ParticipantUpdate,
    ) -> AppResult<()>;
}
