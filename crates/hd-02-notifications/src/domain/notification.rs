//! # Notifications
//!
//! A notification is immutable once stored. Validation happens while turning
//! a [`CreateNotificationRequest`] into a [`Draft`], in this order:
//!
//! 1. `title`, `body` and `priority` must be present and non-blank
//! 2. `priority` must be one of `low`, `medium`, `high`
//! 3. the audience is either a broadcast or the explicit recipient list,
//!    trimmed and de-duplicated with first-seen order kept

use crate::error::NotificationError;
use chrono::{DateTime, Utc};
use shared_types::{CorrelationId, CreateNotificationRequest, NotificationView, Priority};
use uuid::Uuid;

/// Stored notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub sender_id: Option<String>,
    pub broadcast: bool,
    pub created_at: DateTime<Utc>,
    /// Id of the create request; at most one notification per request.
    pub correlation_id: CorrelationId,
}

impl Notification {
    /// Materialise a draft with a fresh id and creation time.
    #[must_use]
    pub fn from_draft(
        draft: &Draft,
        correlation_id: &CorrelationId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: draft.title.clone(),
            body: draft.body.clone(),
            priority: draft.priority,
            sender_id: draft.sender_id.clone(),
            broadcast: draft.audience.is_broadcast(),
            created_at,
            correlation_id: correlation_id.clone(),
        }
    }

    #[must_use]
    pub fn view(&self) -> NotificationView {
        NotificationView {
            id: self.id.clone(),
            title: self.title.clone(),
            body: self.body.clone(),
            priority: self.priority,
            sender_id: self.sender_id.clone(),
            broadcast: self.broadcast,
            created_at: self.created_at,
        }
    }
}

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every active user at creation time.
    Broadcast,
    Explicit(Vec<String>),
}

impl Audience {
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Audience::Broadcast)
    }
}

/// A validated create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub sender_id: Option<String>,
    pub audience: Audience,
}

impl TryFrom<CreateNotificationRequest> for Draft {
    type Error = NotificationError;

    fn try_from(request: CreateNotificationRequest) -> Result<Self, Self::Error> {
        let title = non_blank(request.title);
        let body = non_blank(request.body);
        let priority = non_blank(request.priority);

        let (Some(title), Some(body), Some(priority)) = (title, body, priority) else {
            return Err(NotificationError::MissingFields {
                fields: vec!["title", "body", "priority"],
            });
        };
        let priority: Priority = priority.parse()?;

        let audience = if request.broadcast {
            Audience::Broadcast
        } else {
            Audience::Explicit(dedupe(request.user_ids.unwrap_or_default()))
        };

        Ok(Self {
            title,
            body,
            priority,
            sender_id: non_blank(request.sender_id),
            audience,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim, drop blanks and remove duplicates, keeping first-seen order.
#[must_use]
pub fn dedupe(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}
