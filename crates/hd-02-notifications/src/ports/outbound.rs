//! Driven Ports (SPI - Outbound Dependencies)

use crate::domain::{Notification, Recipient, RecipientFilter, Transition};
use crate::error::StoreError;
use async_trait::async_trait;
use shared_types::CorrelationId;
use thiserror::Error;

/// Notification and recipient persistence.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a notification and all its recipient rows, or nothing.
    ///
    /// Fails with `Duplicate` when the notification id, its correlation id
    /// or a (notification, user) pair is already stored.
    async fn insert_with_recipients(
        &self,
        notification: Notification,
        recipients: Vec<Recipient>,
    ) -> Result<(), StoreError>;

    async fn find_notification(&self, id: &str) -> Result<Option<Notification>, StoreError>;

    /// The notification created for the request `correlation_id`, if any.
    async fn find_by_correlation(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Option<Notification>, StoreError>;

    async fn list_notifications(&self) -> Result<Vec<Notification>, StoreError>;

    async fn select_recipients(&self, filter: &RecipientFilter)
        -> Result<Vec<Recipient>, StoreError>;

    /// Apply `transition` to every row matching `filter` whose status the
    /// transition allows. The guard and the write are one atomic step.
    ///
    /// Returns the number of rows changed.
    async fn update_recipients(
        &self,
        filter: &RecipientFilter,
        transition: Transition,
    ) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("User listing failed: {0}")]
    Failed(String),

    #[error("User listing timed out after {0}ms")]
    Timeout(u64),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Source of broadcast audiences.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Ids of every active user, resolved under `correlation_id`.
    async fn active_user_ids(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Vec<String>, DirectoryError>;
}
