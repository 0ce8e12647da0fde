//! In-memory notification store.
//!
//! Both tables sit behind one lock, so a notification and its recipient
//! rows become visible together and a guarded update never interleaves
//! with another writer.

use crate::domain::{Notification, Recipient, RecipientFilter, Transition};
use crate::error::StoreError;
use crate::ports::NotificationStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::CorrelationId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct MemoryNotificationStore {
    inner: RwLock<Tables>,
    unavailable: AtomicBool,
}

#[derive(Default)]
struct Tables {
    notifications: HashMap<String, Notification>,
    /// correlation id -> notification id
    by_correlation: HashMap<CorrelationId, String>,
    recipients: Vec<Recipient>,
    /// (notification_id, user_id)
    keys: HashSet<(String, String)>,
}

impl MemoryNotificationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.inner.read().recipients.len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert_with_recipients(
        &self,
        notification: Notification,
        recipients: Vec<Recipient>,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.inner.write();
        if tables.notifications.contains_key(&notification.id) {
            return Err(StoreError::Duplicate(format!("notification {}", notification.id)));
        }
        if tables.by_correlation.contains_key(&notification.correlation_id) {
            return Err(StoreError::Duplicate(format!(
                "correlation {}",
                notification.correlation_id
            )));
        }

        let mut keys = HashSet::with_capacity(recipients.len());
        for row in &recipients {
            let key = (row.notification_id.clone(), row.user_id.clone());
            if tables.keys.contains(&key) || !keys.insert(key) {
                return Err(StoreError::Duplicate(format!(
                    "recipient {}/{}",
                    row.notification_id, row.user_id
                )));
            }
        }

        tables.keys.extend(keys);
        tables.recipients.extend(recipients);
        tables
            .by_correlation
            .insert(notification.correlation_id.clone(), notification.id.clone());
        tables
            .notifications
            .insert(notification.id.clone(), notification);
        Ok(())
    }

    async fn find_notification(&self, id: &str) -> Result<Option<Notification>, StoreError> {
        self.check()?;
        Ok(self.inner.read().notifications.get(id).cloned())
    }

    async fn find_by_correlation(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Option<Notification>, StoreError> {
        self.check()?;
        let tables = self.inner.read();
        Ok(tables
            .by_correlation
            .get(correlation_id)
            .and_then(|id| tables.notifications.get(id))
            .cloned())
    }

    async fn list_notifications(&self) -> Result<Vec<Notification>, StoreError> {
        self.check()?;
        Ok(self.inner.read().notifications.values().cloned().collect())
    }

    async fn select_recipients(
        &self,
        filter: &RecipientFilter,
    ) -> Result<Vec<Recipient>, StoreError> {
        self.check()?;
        Ok(self
            .inner
            .read()
            .recipients
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    async fn update_recipients(
        &self,
        filter: &RecipientFilter,
        transition: Transition,
    ) -> Result<u64, StoreError> {
        self.check()?;
        let mut tables = self.inner.write();
        let updated = tables
            .recipients
            .iter_mut()
            .filter(|row| filter.matches(row))
            .map(|row| transition.apply(row))
            .filter(|changed| *changed)
            .count();
        Ok(updated as u64)
    }
}
