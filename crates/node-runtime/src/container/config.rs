//! # Node Configuration
//!
//! Unified configuration for the bus topology and the services.
//!
//! ## Security Requirements
//!
//! - `jwt_secret` MUST NOT be the development default in production
//! - All timeouts and limits have sane defaults with override capability
//!
//! ## Environment
//!
//! | Variable | Default |
//! |----------|---------|
//! | `HERALD_ENVIRONMENT` | `development` |
//! | `HERALD_EXCHANGE` | `herald.events` |
//! | `HERALD_DLX` | `herald.dlx` |
//! | `HERALD_BROADCAST_TIMEOUT_MS` | `10000` |
//! | `HERALD_RETRY_DELAY_MS` | `5000` |
//! | `HERALD_DELIVERY_LIMIT` | `3` |
//! | `HERALD_DLQ_TTL_MS` | `30000` |
//! | `HERALD_JWT_SECRET` | development default, required elsewhere |
//! | `HERALD_JWT_EXPIRY_MINS` | `60` |

use std::str::FromStr;
use std::time::Duration;

use hd_01_identity::adapters::jwt::DEFAULT_EXPIRY_MINS;
use shared_bus::{
    DEAD_LETTER_EXCHANGE, DEFAULT_EXCHANGE, DEFAULT_REQUEST_TIMEOUT, DLQ_MAX_RETRIES,
    DLQ_MESSAGE_TTL, DLQ_RETRY_DELAY,
};
use thiserror::Error;
use tracing::warn;

/// Signing secret used when none is configured in development.
pub const DEV_JWT_SECRET: &str = "herald-development-secret";

const DEVELOPMENT: &str = "development";

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Deployment environment name.
    pub environment: String,
    /// Broker topology and retry policy.
    pub bus: BusConfig,
    /// Identity service configuration.
    pub identity: IdentityConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            environment: DEVELOPMENT.to_string(),
            bus: BusConfig::default(),
            identity: IdentityConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(environment) = lookup("HERALD_ENVIRONMENT") {
            config.environment = environment;
        }

        let bus = &mut config.bus;
        if let Some(exchange) = lookup("HERALD_EXCHANGE") {
            bus.exchange = exchange;
        }
        if let Some(dlx) = lookup("HERALD_DLX") {
            bus.dead_letter_exchange = dlx;
        }
        if let Some(ms) = parse::<u64>(&lookup, "HERALD_BROADCAST_TIMEOUT_MS")? {
            bus.broadcast_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "HERALD_RETRY_DELAY_MS")? {
            bus.retry_delay = Duration::from_millis(ms);
        }
        if let Some(limit) = parse::<u32>(&lookup, "HERALD_DELIVERY_LIMIT")? {
            if limit == 0 {
                return Err(ConfigError::Invalid {
                    key: "HERALD_DELIVERY_LIMIT",
                    value: limit.to_string(),
                });
            }
            bus.delivery_limit = limit;
        }
        if let Some(ms) = parse::<u64>(&lookup, "HERALD_DLQ_TTL_MS")? {
            bus.dlq_ttl = Duration::from_millis(ms);
        }

        if let Some(mins) = parse::<i64>(&lookup, "HERALD_JWT_EXPIRY_MINS")? {
            config.identity.jwt_expiry_mins = mins;
        }
        match lookup("HERALD_JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => config.identity.jwt_secret = secret,
            None if config.is_development() => {
                warn!("HERALD_JWT_SECRET not set, using the development secret");
            }
            None => return Err(ConfigError::MissingJwtSecret),
        }

        Ok(config)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.environment == DEVELOPMENT
    }

    /// Validate configuration for production readiness.
    ///
    /// # Returns
    ///
    /// Returns `Err` if the JWT secret is the development default.
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.identity.jwt_secret == DEV_JWT_SECRET {
            return Err(ConfigError::InsecureJwtSecret);
        }
        Ok(())
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "SECURITY VIOLATION: JWT secret is the development default. \
         Set HERALD_JWT_SECRET environment variable."
    )]
    InsecureJwtSecret,

    #[error("HERALD_JWT_SECRET must be set outside development")]
    MissingJwtSecret,

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Topic exchange carrying every domain event.
    pub exchange: String,
    /// Direct exchange receiving dead-lettered messages.
    pub dead_letter_exchange: String,
    /// How long a broadcast waits for the user list.
    pub broadcast_timeout: Duration,
    /// Delay before a nacked message is redelivered.
    pub retry_delay: Duration,
    /// Failed deliveries before dead-lettering.
    pub delivery_limit: u32,
    /// Retention of dead-lettered messages.
    pub dlq_ttl: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            exchange: DEFAULT_EXCHANGE.to_string(),
            dead_letter_exchange: DEAD_LETTER_EXCHANGE.to_string(),
            broadcast_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_delay: DLQ_RETRY_DELAY,
            delivery_limit: DLQ_MAX_RETRIES,
            dlq_ttl: DLQ_MESSAGE_TTL,
        }
    }
}

/// Identity service configuration.
#[derive(Clone)]
pub struct IdentityConfig {
    /// HS256 signing secret.
    pub jwt_secret: String,
    /// Access token lifetime.
    pub jwt_expiry_mins: i64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expiry_mins: DEFAULT_EXPIRY_MINS,
        }
    }
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiry_mins", &self.jwt_expiry_mins)
            .finish()
    }
}
