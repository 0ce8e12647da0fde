//! Error types for the identity service

use shared_types::{ErrorCode, FailureKind};
use thiserror::Error;

/// The single reason given for every failed login.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Identity service errors
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Required request fields are absent or blank
    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },

    /// A user with this email already exists
    #[error("Email already in use")]
    EmailInUse,

    /// Unknown email, wrong password or inactive account
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The user store is unavailable
    #[error("Storage error: {reason}")]
    Storage { reason: String },

    /// Password hashing failed
    #[error("Password hashing failed: {reason}")]
    Hashing { reason: String },

    /// Token signing failed
    #[error("Token issuance failed: {reason}")]
    Token { reason: String },
}

impl IdentityError {
    /// Failure classification used to decide between publishing a failure
    /// event and retrying the message.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingFields { .. } => FailureKind::Validation,
            Self::EmailInUse => FailureKind::Conflict,
            Self::InvalidCredentials => FailureKind::Unauthorized,
            Self::Storage { .. } | Self::Hashing { .. } | Self::Token { .. } => {
                FailureKind::Transient
            }
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.kind().code()
    }

    /// Human-readable reason placed in `*.failed` payloads.
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;
