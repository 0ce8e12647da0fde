//! # Domain Entities
//!
//! Shapes that cross service boundaries inside event payloads.
//!
//! ## Clusters
//!
//! - **Notifications**: `Priority`, `RecipientStatus`, `NotificationView`,
//!   `InboxItem`, `HistoryEntry`
//! - **Identity**: `Role`, `UserSummary`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// CLUSTER A: NOTIFICATIONS
// =============================================================================

/// Severity tier of a notification.
///
/// Deployments that speak `info|warning|critical` are accepted on input and
/// mapped onto the same three tiers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[serde(alias = "info")]
    #[default]
    Low,
    #[serde(alias = "warning")]
    Medium,
    #[serde(alias = "critical")]
    High,
}

impl Priority {
    /// The only tier whose notifications can be acknowledged.
    pub const TOP_TIER: Priority = Priority::High;

    #[must_use]
    pub fn is_top_tier(self) -> bool {
        self == Self::TOP_TIER
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a priority string names no known tier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid priority: {0}")]
pub struct ParsePriorityError(pub String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "info" => Ok(Priority::Low),
            "medium" | "warning" => Ok(Priority::Medium),
            "high" | "critical" => Ok(Priority::High),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

/// Per-recipient lifecycle state.
///
/// Variants are declared in lifecycle order so that `Ord` expresses
/// "has progressed at least as far as".
///
/// ```text
/// created ──→ delivered ──→ read ──→ acknowledged
///    │            │           ↑            ↑
///    └────────────┴───────────┘            │
///    └────────────┴────────────────────────┘  (top tier only)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    #[default]
    Created,
    Delivered,
    Read,
    Acknowledged,
}

impl RecipientStatus {
    /// States that count towards a user's unread total.
    pub const UNREAD: [RecipientStatus; 2] = [RecipientStatus::Created, RecipientStatus::Delivered];

    /// States from which an acknowledgement may be recorded.
    pub const ACKNOWLEDGEABLE: [RecipientStatus; 3] = [
        RecipientStatus::Created,
        RecipientStatus::Delivered,
        RecipientStatus::Read,
    ];

    #[must_use]
    pub fn is_unread(self) -> bool {
        Self::UNREAD.contains(&self)
    }

    #[must_use]
    pub fn has_reached(self, other: RecipientStatus) -> bool {
        self >= other
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecipientStatus::Created => "created",
            RecipientStatus::Delivered => "delivered",
            RecipientStatus::Read => "read",
            RecipientStatus::Acknowledged => "acknowledged",
        }
    }
}

impl fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable view of a notification as published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    /// `None` means the system sent it.
    pub sender_id: Option<String>,
    pub broadcast: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification joined with one recipient's lifecycle columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxItem {
    #[serde(flatten)]
    pub notification: NotificationView,
    pub status: RecipientStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// Administrative aggregate over all recipients of one notification.
///
/// Counts are derived from recipient rows at query time, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub notification: NotificationView,
    pub recipient_count: u64,
    pub delivered_count: u64,
    pub read_count: u64,
    pub acknowledged_count: u64,
}

// =============================================================================
// CLUSTER B: IDENTITY
// =============================================================================

/// Authorization role carried in tokens and user listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public projection of a user row. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
