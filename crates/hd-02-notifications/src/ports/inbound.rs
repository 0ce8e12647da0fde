//! Driving Ports (API - Inbound)

use crate::domain::Draft;
use crate::error::NotificationResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{
    CorrelationId, HistoryEntry, InboxItem, NotificationAcknowledged, NotificationCreated,
    NotificationRead,
};

/// Default inbox page size.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest inbox page a caller may ask for.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A normalised inbox page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Page defaults to 1, limit to [`DEFAULT_PAGE_LIMIT`] clamped to
    /// `1..=MAX_PAGE_LIMIT`.
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of a user's inbox.
#[derive(Debug, Clone, PartialEq)]
pub struct InboxPage {
    pub items: Vec<InboxItem>,
    pub total: u64,
    pub page: Page,
}

/// Primary notification API
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Store a notification with one `created` row per recipient.
    ///
    /// Broadcast audiences are resolved under `correlation_id`.
    async fn create(
        &self,
        correlation_id: &CorrelationId,
        draft: Draft,
    ) -> NotificationResult<NotificationCreated>;

    /// Record a delivery confirmation. Returns whether the row moved.
    async fn deliver(
        &self,
        notification_id: &str,
        user_id: &str,
        delivered_at: Option<DateTime<Utc>>,
    ) -> NotificationResult<bool>;

    /// Idempotent; repeated calls report the first read time.
    async fn mark_read(&self, notification_id: &str, user_id: &str)
        -> NotificationResult<NotificationRead>;

    /// Returns the number of rows moved to `read`.
    async fn mark_all_read(&self, user_id: &str) -> NotificationResult<u64>;

    /// Top-tier notifications only. Repeated calls report the first
    /// acknowledgement time.
    async fn acknowledge(
        &self,
        notification_id: &str,
        user_id: &str,
    ) -> NotificationResult<NotificationAcknowledged>;

    async fn unread_count(&self, user_id: &str) -> NotificationResult<u64>;

    /// Newest first.
    async fn list(&self, user_id: &str, page: Page) -> NotificationResult<InboxPage>;

    /// Every notification, newest first, with per-status counts.
    async fn history(&self) -> NotificationResult<Vec<HistoryEntry>>;

    /// Top-tier notifications the user has not acknowledged, newest first.
    async fn pending_critical(&self, user_id: &str) -> NotificationResult<Vec<InboxItem>>;
}
