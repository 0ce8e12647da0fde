//! # Recipient Rows
//!
//! One row per (notification, user). Status only ever moves forward:
//!
//! ```text
//! ┌─────────┐ Deliver ┌───────────┐ MarkRead ┌──────┐ Acknowledge ┌──────────────┐
//! │ created │────────►│ delivered │─────────►│ read │────────────►│ acknowledged │
//! └─────────┘         └───────────┘          └──────┘             └──────────────┘
//!      │                    ▲                   ▲                        ▲
//!      └────────────────────┼───── MarkRead ────┘                        │
//!      └────────────────────┴──────────────── Acknowledge ───────────────┘
//! ```
//!
//! Transitions are applied through a [`RecipientFilter`] so that the store
//! can evaluate the guard and the write under a single lock.

use chrono::{DateTime, Utc};
use shared_types::{InboxItem, RecipientStatus};
use uuid::Uuid;

use super::Notification;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub id: String,
    pub notification_id: String,
    pub user_id: String,
    pub status: RecipientStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Recipient {
    #[must_use]
    pub fn new(notification_id: &str, user_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            notification_id: notification_id.to_string(),
            user_id: user_id.to_string(),
            status: RecipientStatus::Created,
            delivered_at: None,
            read_at: None,
            acknowledged_at: None,
            created_at,
        }
    }

    /// Inbox projection of this row joined with its notification.
    #[must_use]
    pub fn inbox_item(&self, notification: &Notification) -> InboxItem {
        InboxItem {
            notification: notification.view(),
            status: self.status,
            delivered_at: self.delivered_at,
            read_at: self.read_at,
            acknowledged_at: self.acknowledged_at,
        }
    }
}

/// A forward status move with its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Deliver { at: DateTime<Utc> },
    MarkRead { at: DateTime<Utc> },
    Acknowledge { at: DateTime<Utc> },
}

impl Transition {
    /// Statuses the transition may start from.
    #[must_use]
    pub fn allowed_from(&self) -> &'static [RecipientStatus] {
        match self {
            Transition::Deliver { .. } => &[RecipientStatus::Created],
            Transition::MarkRead { .. } => &RecipientStatus::UNREAD,
            Transition::Acknowledge { .. } => &RecipientStatus::ACKNOWLEDGEABLE,
        }
    }

    #[must_use]
    pub fn target(&self) -> RecipientStatus {
        match self {
            Transition::Deliver { .. } => RecipientStatus::Delivered,
            Transition::MarkRead { .. } => RecipientStatus::Read,
            Transition::Acknowledge { .. } => RecipientStatus::Acknowledged,
        }
    }

    /// Apply to `row` if its status allows it. Returns whether it changed.
    pub fn apply(&self, row: &mut Recipient) -> bool {
        if !self.allowed_from().contains(&row.status) {
            return false;
        }
        match *self {
            Transition::Deliver { at } => row.delivered_at = Some(at),
            Transition::MarkRead { at } => row.read_at = Some(at),
            Transition::Acknowledge { at } => {
                row.acknowledged_at = Some(at);
                row.read_at.get_or_insert(at);
            }
        }
        row.status = self.target();
        true
    }
}

/// Predicate over recipient rows. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientFilter {
    pub notification_id: Option<String>,
    pub user_id: Option<String>,
    pub statuses: Option<Vec<RecipientStatus>>,
}

impl RecipientFilter {
    /// The single row for (notification, user).
    #[must_use]
    pub fn row(notification_id: &str, user_id: &str) -> Self {
        Self {
            notification_id: Some(notification_id.to_string()),
            user_id: Some(user_id.to_string()),
            statuses: None,
        }
    }

    /// Every row of one notification.
    #[must_use]
    pub fn notification(notification_id: &str) -> Self {
        Self {
            notification_id: Some(notification_id.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_statuses(mut self, statuses: &[RecipientStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    #[must_use]
    pub fn matches(&self, row: &Recipient) -> bool {
        self.notification_id
            .as_ref()
            .map_or(true, |id| *id == row.notification_id)
            && self.user_id.as_ref().map_or(true, |id| *id == row.user_id)
            && self
                .statuses
                .as_ref()
                .map_or(true, |s| s.contains(&row.status))
    }
}
