//! LiveKit room service client over its Twirp JSON API.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ParticipantUpdate, RoomOptions, RoomProvision, VideoBackend};
use crate::error::{AppError, AppResult};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const CONNECT_TIMEOUT_SECS: u64 = 5;
/// Lifetime of the short admin tokens attached to room service calls.
const ADMIN_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);
const ROOM_SERVICE: &str = "twirp/livekit.RoomService";

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoGrant {
    #[serde(skip_serializing_if = "Option::is_none")]
    room: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    room_join: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    room_create: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    room_list: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    room_admin: bool,
}

#[derive(Debug, Serialize)]
struct AccessClaims {
    iss: String,
    sub: String,
    nbf: u64,
    exp: u64,
    video: VideoGrant,
}

#[derive(Debug, Serialize)]
struct CreateRoomRequest<'a> {
    name: &'a str,
    empty_timeout: u32,
    max_participants: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    metadata: String,
}

impl<'a> CreateRoomRequest<'a> {
    fn new(name: &'a str, options: RoomOptions) -> Self {
        let metadata = if options.max_duration_secs > 0 {
            serde_json::json!({ "maxDurationSeconds": options.max_duration_secs }).to_string()
        } else {
            String::new()
        };
        Self {
            name,
            empty_timeout: options.empty_timeout_secs,
            max_participants: options.max_participants,
            metadata,
        }
    }
}

#[derive(Debug, Serialize)]
struct RoomRequest<'a> {
    room: &'a str,
}

#[derive(Debug, Serialize)]
struct ParticipantRequest<'a> {
    room: &'a str,
    identity: &'a str,
}

#[derive(Debug, Serialize)]
struct MuteTrackRequest<'a> {
    room: &'a str,
    identity: &'a str,
    track_sid: &'a str,
    muted: bool,
}

#[derive(Debug, Serialize)]
struct PermissionRequest {
    can_subscribe: bool,
    can_publish: bool,
    can_publish_data: bool,
}

#[derive(Debug, Serialize)]
struct UpdateParticipantRequest<'a> {
    room: &'a str,
    identity: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    permission: Option<PermissionRequest>,
}

#[derive(Debug, Deserialize)]
struct ParticipantInfo {
    identity: String,
}

#[derive(Debug, Default, Deserialize)]
struct ListParticipantsResponse {
    #[serde(default)]
    participants: Vec<ParticipantInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct TwirpError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    msg: String,
}

#[derive(Clone)]
pub struct LiveKitClient {
    client: Client,
    host: String,
    api_key: String,
    api_secret: String,
}

impl LiveKitClient {
    pub fn new(host: &str, api_key: String, api_secret: String) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build LiveKit HTTP client");
                AppError::InternalServerError(anyhow::anyhow!("failed to build HTTP client"))
            })?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
        })
    }

    fn sign(&self, identity: &str, grant: VideoGrant, ttl: Duration) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let claims = AccessClaims {
            iss: self.api_key.clone(),
            sub: identity.to_string(),
            nbf: now,
            exp: now + ttl.as_secs(),
            video: grant,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )
        .map_err(|e| AppError::InternalServerError(anyhow::anyhow!("failed to sign token: {}", e)))
    }

    fn admin_token(&self, room: Option<&str>) -> AppResult<String> {
        let grant = VideoGrant {
            room: room.map(str::to_string),
            room_create: room.is_none(),
            room_list: room.is_none(),
            room_admin: room.is_some(),
            ..Default::default()
        };
        self.sign(&self.api_key, grant, ADMIN_TOKEN_TTL)
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: &str,
        room: Option<&str>,
        body: &B,
    ) -> AppResult<reqwest::Response> {
        let url = format!("{}/{}/{}", self.host, ROOM_SERVICE, method);
        let token = self.admin_token(room)?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(method, error = %e, "LiveKit request failed");
                AppError::UpstreamFailure(anyhow::anyhow!("video backend is unavailable"))
            })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let error: TwirpError = response.json().await.unwrap_or_default();
        Err(map_twirp_error(method, status, &error))
    }
}

fn map_twirp_error(method: &str, status: StatusCode, error: &TwirpError) -> AppError {
    tracing::warn!(method, %status, code = %error.code, msg = %error.msg, "LiveKit returned an error");
    match (status, error.code.as_str()) {
        (StatusCode::NOT_FOUND, _) | (_, "not_found") => {
            AppError::NotFound(anyhow::anyhow!("{}: {}", method, error.msg))
        }
        (StatusCode::CONFLICT, _) | (_, "already_exists") => {
            AppError::InvalidState(anyhow::anyhow!("{}: already exists", method))
        }
        _ => AppError::UpstreamFailure(anyhow::anyhow!("{} failed with status {}", method, status)),
    }
}

#[async_trait]
impl VideoBackend for LiveKitClient {
    async fn create_room(&self, name: &str, options: RoomOptions) -> AppResult<RoomProvision> {
        let request = CreateRoomRequest::new(name, options);
        match self.call("CreateRoom", None, &request).await {
            Ok(_) => {
                tracing::info!(room = name, "room created");
                Ok(RoomProvision::Created)
            }
            Err(AppError::InvalidState(_)) => {
                tracing::debug!(room = name, "room already exists");
                Ok(RoomProvision::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_participants(&self, room: &str) -> AppResult<Vec<String>> {
        let response = self
            .call("ListParticipants", Some(room), &RoomRequest { room })
            .await?;
        let body: ListParticipantsResponse = response.json().await.map_err(|e| {
            AppError::UpstreamFailure(anyhow::anyhow!("invalid participant list: {}", e))
        })?;
        Ok(body.participants.into_iter().map(|p| p.identity).collect())
    }

    fn mint_join_credential(
        &self,
        room: &str,
        identity: &str,
        can_create: bool,
        ttl: Duration,
    ) -> AppResult<String> {
        let grant = VideoGrant {
            room: Some(room.to_string()),
            room_join: true,
            room_create: can_create,
            ..Default::default()
        };
        self.sign(identity, grant, ttl)
    }

    async fn remove_participant(&self, room: &str, identity: &str) -> AppResult<()> {
        self.call(
            "RemoveParticipant",
            Some(room),
            &ParticipantRequest { room, identity },
        )
        .await?;
        Ok(())
    }

    async fn mute_track(
        &self,
        room: &str,
        identity: &str,
        track_sid: &str,
        muted: bool,
    ) -> AppResult<()> {
        let request = MuteTrackRequest {
            room,
            identity,
            track_sid,
            muted,
        };
        self.call("MutePublishedTrack", Some(room), &request).await?;
        Ok(())
    }

    async fn update_participant(
        &self,
        room: &str,
        identity: &str,
        update: &ParticipantUpdate,
    ) -> AppResult<()> {
        let request = UpdateParticipantRequest {
            room,
            identity,
            metadata: update.metadata.as_deref().filter(|m| !m.is_empty()),
            permission: update.permission.map(|p| PermissionRequest {
                can_subscribe: p.can_subscribe,
                can_publish: p.can_publish,
                can_publish_data: p.can_publish_data,
            }),
        };
        self.call("UpdateParticipant", Some(room), &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn client() -> LiveKitClient {
        LiveKitClient::new("http://localhost:7880/", "key".to_string(), "secret".to_string())
            .unwrap()
    }

    #[test]
    fn join_credential_carries_room_grant() {
        let token = client()
            .mint_join_credential("room-1", "alice", true, Duration::from_secs(3600))
            .unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        let decoded = decode::<serde_json::Value>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &validation,
        )
        .unwrap();

        let claims = decoded.claims;
        assert_eq!(claims["iss"], "key");
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["video"]["room"], "room-1");
        assert_eq!(claims["video"]["roomJoin"], true);
        assert_eq!(claims["video"]["roomCreate"], true);
        assert!(claims["video"].get("roomAdmin").is_none());
        let ttl = claims["exp"].as_u64().unwrap() - claims["nbf"].as_u64().unwrap();
        assert_eq!(ttl, 3600);
    }

    #[test]
    fn duration_limit_travels_as_room_metadata() {
        let limited = CreateRoomRequest::new(
            "room-1",
            RoomOptions {
                empty_timeout_secs: 300,
                max_participants: 4,
                max_duration_secs: 1800,
            },
        );
        let body = serde_json::to_value(&limited).unwrap();
        assert_eq!(body["max_participants"], 4);
        assert_eq!(body["metadata"], r#"{"maxDurationSeconds":1800}"#);

        let open = serde_json::to_value(CreateRoomRequest::new("room-2", RoomOptions::default()))
            .unwrap();
        assert!(open.get("metadata").is_none());
    }

    #[test]
    fn host_trailing_slash_is_trimmed() {
        assert_eq!(client().host, "http://localhost:7880");
    }

    #[test]
    fn twirp_errors_map_to_taxonomy() {
        let conflict = TwirpError {
            code: "already_exists".to_string(),
            msg: String::new(),
        };
        assert!(matches!(
            map_twirp_error("CreateRoom", StatusCode::CONFLICT, &conflict),
            AppError::InvalidState(_)
        ));
        assert!(matches!(
            map_twirp_error("ListParticipants", StatusCode::NOT_FOUND, &TwirpError::default()),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            map_twirp_error("CreateRoom", StatusCode::INTERNAL_SERVER_ERROR, &TwirpError::default()),
            AppError::UpstreamFailure(_)
        ));
    }
}
