pub mod calls;
pub mod contacts;
pub mod history;
pub mod participants;
pub mod scheduled;
pub mod users;

pub use calls::CallService;
pub use contacts::ContactService;
pub use history::HistoryService;
pub use participants::ParticipantService;
pub use scheduled::ScheduledService;
pub use users::UserService;

use std::time::Duration;

use crate::config::{Config, DEFAULT_JOIN_TOKEN_TTL_SECONDS, DEFAULT_ROOM_MAX_PARTICIPANTS};

/// Room and credential settings shared by the call and scheduler services.
#[derive(Debug, Clone)]
pub struct CallSettings {
    pub join_token_ttl: Duration,
    pub room_empty_timeout_secs: u32,
    /// Applied to scheduled calls created without a positive cap.
    pub default_max_participants: u32,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            join_token_ttl: Duration::from_secs(DEFAULT_JOIN_TOKEN_TTL_SECONDS),
            room_empty_timeout_secs: 0,
            default_max_participants: DEFAULT_ROOM_MAX_PARTICIPANTS,
        }
    }
}

impl From<&Config> for CallSettings {
    fn from(config: &Config) -> Self {
        Self {
            join_token_ttl: config.join_token_ttl,
            room_empty_timeout_secs: config.room_empty_timeout_secs,
            default_max_participants: config.room_max_participants,
        }
    }
}
