//! Error types for the notification service

use shared_types::{ErrorCode, FailureKind, ParsePriorityError};
use thiserror::Error;

/// Storage failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached; the operation may succeed later.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A unique key already exists.
    #[error("Duplicate key: {0}")]
    Duplicate(String),
}

/// Notification service errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<&'static str> },

    #[error("{0}")]
    InvalidPriority(#[from] ParsePriorityError),

    #[error("No recipients specified")]
    NoRecipients,

    /// Broadcast recipient resolution failed or timed out
    #[error("Broadcast failed: could not retrieve user list")]
    BroadcastFailed { cause: String },

    #[error("Notification not found")]
    NotificationNotFound { notification_id: String },

    #[error("Recipient record not found")]
    RecipientNotFound { notification_id: String },

    #[error("Only high priority notifications can be acknowledged")]
    NotAcknowledgeable { notification_id: String },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl NotificationError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingFields { .. }
            | Self::InvalidPriority(_)
            | Self::NoRecipients
            | Self::NotAcknowledgeable { .. } => FailureKind::Validation,
            Self::NotificationNotFound { .. } | Self::RecipientNotFound { .. } => {
                FailureKind::NotFound
            }
            Self::BroadcastFailed { .. } => FailureKind::Timeout,
            Self::Store(StoreError::Duplicate(_)) => FailureKind::Conflict,
            Self::Store(StoreError::Unavailable(_)) => FailureKind::Transient,
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

    /// The notification the failure concerns, when there is one.
    #[must_use]
    pub fn notification_id(&self) -> Option<&str> {
        match self {
            Self::NotificationNotFound { notification_id }
            | Self::RecipientNotFound { notification_id }
            | Self::NotAcknowledgeable { notification_id } => Some(notification_id),
            _ => None,
        }
    }
}

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;
