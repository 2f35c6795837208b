//! Runtime Configuration
//!
//! Settings for the embedding application, read from the environment.
//! Every field has a default so an empty environment gives a working
//! (unauthenticated) setup.
//!
//! | Variable                      | Field                         | Default     |
//! |-------------------------------|-------------------------------|-------------|
//! | `ARENA_REVEAL_WINDOW_MINUTES` | `reveal_window`               | 10          |
//! | `ARENA_REVEAL_POLL_MS`        | `poll_interval`               | 1000        |
//! | `ARENA_ROOM_ID`               | `room_credentials.room_id`    | `12345678`  |
//! | `ARENA_ROOM_PASSWORD`         | `room_credentials.password`   | `pugb123`   |
//! | `ARENA_OPENING_BALANCE`       | `opening_balance`             | 0           |
//! | `AUTH_ISSUER`                 | `auth.issuer`                 | unset       |
//! | `AUTH_AUDIENCE`               | `auth.audience`               | unset       |
//! | `AUTH_PUBLIC_KEY_PEM`         | `auth.public_key_pem`         | unset       |
//! | `AUTH_SECRET`                 | `auth.secret`                 | unset       |
//! | `AUTH_SKIP_EXPIRY`            | `auth.skip_expiry`            | false       |

use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;

use crate::core::money::Coins;
use crate::tournament::gate::DEFAULT_REVEAL_WINDOW_MINUTES;
use crate::tournament::record::RoomCredentials;
use crate::tournament::reveal::DEFAULT_POLL_INTERVAL;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but unreadable.
    #[error("{name} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Token validation settings for the external auth provider.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Required `iss` claim, if any.
    pub issuer: Option<String>,
    /// Required `aud` claim, if any.
    pub audience: Option<String>,
    /// RS256 public key (PEM). Takes precedence over `secret`.
    pub public_key_pem: Option<String>,
    /// HS256 shared secret.
    pub secret: Option<String>,
    /// Accept expired tokens. Testing only.
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Read `AUTH_*` variables.
    pub fn from_env() -> Self {
        Self {
            issuer: env_string("AUTH_ISSUER"),
            audience: env_string("AUTH_AUDIENCE"),
            public_key_pem: env_string("AUTH_PUBLIC_KEY_PEM"),
            secret: env_string("AUTH_SECRET"),
            skip_expiry: env_string("AUTH_SKIP_EXPIRY")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    /// Whether any verification key is present.
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }
}

/// Top-level settings.
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Lead time before start when room credentials show.
    pub reveal_window: Duration,
    /// Reveal watcher cadence.
    pub poll_interval: StdDuration,
    /// Credentials handed to joined viewers.
    pub room_credentials: RoomCredentials,
    /// Balance seeded into new viewer sessions.
    pub opening_balance: Coins,
    /// Token validation.
    pub auth: AuthConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            reveal_window: Duration::minutes(DEFAULT_REVEAL_WINDOW_MINUTES),
            poll_interval: DEFAULT_POLL_INTERVAL,
            room_credentials: RoomCredentials::new("12345678", "pugb123"),
            opening_balance: Coins::ZERO,
            auth: AuthConfig::default(),
        }
    }
}

impl ArenaConfig {
    /// Defaults overridden by whatever variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = env_string("ARENA_REVEAL_WINDOW_MINUTES") {
            let minutes: i64 = parse_var("ARENA_REVEAL_WINDOW_MINUTES", &raw)?;
            config.reveal_window = Duration::try_minutes(minutes)
                .filter(|_| minutes >= 0)
                .ok_or_else(|| invalid("ARENA_REVEAL_WINDOW_MINUTES", raw))?;
        }
        if let Some(raw) = env_string("ARENA_REVEAL_POLL_MS") {
            let ms: u64 = parse_var("ARENA_REVEAL_POLL_MS", &raw)?;
            if ms == 0 {
                return Err(invalid("ARENA_REVEAL_POLL_MS", raw));
            }
            config.poll_interval = StdDuration::from_millis(ms);
        }
        if let Some(room_id) = env_string("ARENA_ROOM_ID") {
            config.room_credentials.room_id = room_id;
        }
        if let Some(password) = env_string("ARENA_ROOM_PASSWORD") {
            config.room_credentials.password = password;
        }
        if let Some(raw) = env_string("ARENA_OPENING_BALANCE") {
            let amount = Coins::parse_loose(&raw).map_err(|_| invalid("ARENA_OPENING_BALANCE", raw.clone()))?;
            if amount.is_negative() {
                return Err(invalid("ARENA_OPENING_BALANCE", raw));
            }
            config.opening_balance = amount;
        }
        config.auth = AuthConfig::from_env();

        Ok(config)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(name, raw.to_string()))
}

fn invalid(name: &'static str, value: String) -> ConfigError {
    ConfigError::InvalidValue { name, value }
}
