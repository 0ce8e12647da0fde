//! # Error Types
//!
//! Defines the failure taxonomy shared across services and the codec errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of every failure a service can observe.
///
/// Only `Transient` is retried (by broker redelivery). Every other kind is
/// reported once through a `*.failed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Missing or malformed request fields.
    Validation,
    /// Referenced entity absent.
    NotFound,
    /// Duplicate unique key.
    Conflict,
    /// Credentials rejected.
    Unauthorized,
    /// Broker or store connectivity loss.
    Transient,
    /// A correlated reply never arrived.
    Timeout,
}

impl FailureKind {
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Transient)
    }

    /// Structured code reported to the HTTP boundary.
    #[must_use]
    pub fn code(self) -> ErrorCode {
        match self {
            FailureKind::Validation => ErrorCode::BadRequest,
            FailureKind::NotFound => ErrorCode::NotFound,
            FailureKind::Conflict => ErrorCode::Conflict,
            FailureKind::Unauthorized => ErrorCode::Unauthorized,
            FailureKind::Transient | FailureKind::Timeout => ErrorCode::Internal,
        }
    }
}

/// Wire-level error code carried in failure payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorCode {
    /// HTTP status the gateway translates this code to.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::BadRequest => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::Internal => 500,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while decoding an envelope from the wire.
///
/// All variants are terminal: the transport rejects the message straight to
/// the dead-letter queue instead of retrying it.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Bytes are not a JSON object.
    #[error("Malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// A required header field is absent or empty.
    #[error("Missing required envelope field: {0}")]
    MissingField(&'static str),

    /// `eventType` is outside the closed event set.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// `timestamp` is not RFC 3339.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Payload does not match the shape required by its event type.
    #[error("Invalid payload for {event_type}: {source}")]
    InvalidPayload {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors produced while encoding an envelope.
#[derive(Debug, Error)]
#[error("Failed to encode envelope: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);
