//! Service configuration.
//!
//! Loaded from environment variables (after `.env` is applied by `main`).
//! Secrets are redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_LIVEKIT_HOST: &str = "http://localhost:7880";
pub const DEFAULT_ROOM_MAX_PARTICIPANTS: u32 = 20;
pub const DEFAULT_JOIN_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;
pub const DEFAULT_REMINDER_INTERVAL_SECONDS: u64 = 30;
pub const DEFAULT_HUB_BUFFER_SIZE: usize = 256;

#[derive(Clone)]
pub struct Config {
    /// Postgres URL, or `memory` for the in-process repository.
    pub database_url: String,
    pub bind_address: String,
    /// HS256 secret used to verify client bearer tokens.
    pub jwt_secret: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub livekit_host: String,
    pub room_empty_timeout_secs: u32,
    pub room_max_participants: u32,
    pub join_token_ttl: Duration,
    pub reminder_interval: Duration,
    pub hub_buffer_size: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"[REDACTED]")
            .field("livekit_api_key", &self.livekit_api_key)
            .field("livekit_api_secret", &"[REDACTED]")
            .field("livekit_host", &self.livekit_host)
            .field("room_empty_timeout_secs", &self.room_empty_timeout_secs)
            .field("room_max_participants", &self.room_max_participants)
            .field("join_token_ttl", &self.join_token_ttl)
            .field("reminder_interval", &self.reminder_interval)
            .field("hub_buffer_size", &self.hub_buffer_size)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map (used by tests).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let required = |name: &str| -> Result<String, ConfigError> {
            vars.get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
        };

        let reminder_secs: u64 = parse_or(
            vars,
            "REMINDER_INTERVAL_SECONDS",
            DEFAULT_REMINDER_INTERVAL_SECONDS,
        )?;
        if reminder_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "REMINDER_INTERVAL_SECONDS".to_string(),
                value: "0".to_string(),
            });
        }

        let hub_buffer_size: usize = parse_or(vars, "HUB_BUFFER_SIZE", DEFAULT_HUB_BUFFER_SIZE)?;
        if hub_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "HUB_BUFFER_SIZE".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_address: vars
                .get("BIND_ADDRESS")
                .cloned()
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            jwt_secret: required("JWT_SECRET")?,
            livekit_api_key: required("LIVEKIT_API_KEY")?,
            livekit_api_secret: required("LIVEKIT_API_SECRET")?,
            livekit_host: vars
                .get("LIVEKIT_HOST")
                .cloned()
                .unwrap_or_else(|| DEFAULT_LIVEKIT_HOST.to_string()),
            room_empty_timeout_secs: parse_or(vars, "ROOM_EMPTY_TIMEOUT", 0)?,
            room_max_participants: parse_or(
                vars,
                "ROOM_MAX_PARTICIPANTS",
                DEFAULT_ROOM_MAX_PARTICIPANTS,
            )?,
            join_token_ttl: Duration::from_secs(parse_or(
                vars,
                "JOIN_TOKEN_TTL_SECONDS",
                DEFAULT_JOIN_TOKEN_TTL_SECONDS,
            )?),
            reminder_interval: Duration::from_secs(reminder_secs),
            hub_buffer_size,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == "memory"
    }
}

fn parse_or<T: FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw.clone(),
        }),
    }
}
