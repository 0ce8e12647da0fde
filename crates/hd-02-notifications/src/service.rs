//! Notification Service - Core business logic

use crate::domain::{dedupe, Audience, Draft, Notification, Recipient, RecipientFilter, Transition};
use crate::error::{NotificationError, NotificationResult, StoreError};
use crate::ipc::SERVICE_NAME;
use crate::ports::{InboxPage, NotificationApi, NotificationStore, Page, RecipientDirectory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_telemetry::{log_event, NOTIFICATIONS_CREATED, RECIPIENT_TRANSITIONS};
use shared_types::{
    CorrelationId, HistoryEntry, InboxItem, NotificationAcknowledged, NotificationCreated,
    NotificationRead, RecipientStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Notification service over a store and a broadcast directory.
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    directory: Arc<dyn RecipientDirectory>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, directory: Arc<dyn RecipientDirectory>) -> Self {
        Self { store, directory }
    }

    async fn resolve_audience(
        &self,
        correlation_id: &CorrelationId,
        audience: Audience,
    ) -> NotificationResult<Vec<String>> {
        let recipients = match audience {
            Audience::Explicit(ids) => ids,
            Audience::Broadcast => {
                let ids = self
                    .directory
                    .active_user_ids(correlation_id)
                    .await
                    .map_err(|e| {
                        log_event!(
                            warn,
                            SERVICE_NAME,
                            "Broadcast resolution failed",
                            correlation_id = %correlation_id,
                            error = %e
                        );
                        NotificationError::BroadcastFailed {
                            cause: e.to_string(),
                        }
                    })?;
                dedupe(ids)
            }
        };

        if recipients.is_empty() {
            return Err(NotificationError::NoRecipients);
        }
        Ok(recipients)
    }

    async fn transition(
        &self,
        filter: &RecipientFilter,
        transition: Transition,
    ) -> NotificationResult<u64> {
        let updated = self.store.update_recipients(filter, transition).await?;
        if updated > 0 {
            RECIPIENT_TRANSITIONS
                .with_label_values(&[transition.target().as_str()])
                .inc_by(updated as f64);
        }
        Ok(updated)
    }

    async fn find_row(&self, notification_id: &str, user_id: &str) -> NotificationResult<Recipient> {
        self.store
            .select_recipients(&RecipientFilter::row(notification_id, user_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NotificationError::RecipientNotFound {
                notification_id: notification_id.to_string(),
            })
    }

    /// The outcome of an earlier create under the same correlation id.
    async fn replay(&self, notification: Notification) -> NotificationResult<NotificationCreated> {
        let recipient_ids = self
            .store
            .select_recipients(&RecipientFilter::notification(&notification.id))
            .await?
            .into_iter()
            .map(|row| row.user_id)
            .collect();
        debug!(
            notification_id = %notification.id,
            correlation_id = %notification.correlation_id,
            "Create request redelivered, returning the stored notification"
        );
        Ok(NotificationCreated {
            notification: notification.view(),
            recipient_ids,
        })
    }

    /// Join rows with their notifications, newest first.
    async fn inbox(&self, rows: Vec<Recipient>) -> NotificationResult<Vec<(Notification, Recipient)>> {
        let notifications: HashMap<String, Notification> = self
            .store
            .list_notifications()
            .await?
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();

        let mut joined: Vec<_> = rows
            .into_iter()
            .filter_map(|row| {
                notifications
                    .get(&row.notification_id)
                    .cloned()
                    .map(|n| (n, row))
            })
            .collect();
        joined.sort_by(|(a, _), (b, _)| newest_first(a, b));
        Ok(joined)
    }
}

fn newest_first(a: &Notification, b: &Notification) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[async_trait]
impl NotificationApi for NotificationService {
    async fn create(
        &self,
        correlation_id: &CorrelationId,
        draft: Draft,
    ) -> NotificationResult<NotificationCreated> {
        if let Some(existing) = self.store.find_by_correlation(correlation_id).await? {
            return self.replay(existing).await;
        }

        let now = Utc::now();
        let notification = Notification::from_draft(&draft, correlation_id, now);
        let recipient_ids = self.resolve_audience(correlation_id, draft.audience).await?;

        let rows = recipient_ids
            .iter()
            .map(|user_id| Recipient::new(&notification.id, user_id, now))
            .collect();
        match self
            .store
            .insert_with_recipients(notification.clone(), rows)
            .await
        {
            Ok(()) => {}
            // Lost a race with a concurrent redelivery of the same request
            Err(StoreError::Duplicate(key)) => {
                return match self.store.find_by_correlation(correlation_id).await? {
                    Some(existing) => self.replay(existing).await,
                    None => Err(StoreError::Duplicate(key).into()),
                };
            }
            Err(e) => return Err(e.into()),
        }

        NOTIFICATIONS_CREATED
            .with_label_values(&[notification.priority.as_str()])
            .inc();
        log_event!(
            info,
            SERVICE_NAME,
            "Notification created",
            notification_id = %notification.id,
            priority = %notification.priority.as_str(),
            broadcast = notification.broadcast,
            recipients = recipient_ids.len()
        );

        Ok(NotificationCreated {
            notification: notification.view(),
            recipient_ids,
        })
    }

    async fn deliver(
        &self,
        notification_id: &str,
        user_id: &str,
        delivered_at: Option<DateTime<Utc>>,
    ) -> NotificationResult<bool> {
        let at = delivered_at.unwrap_or_else(Utc::now);
        let updated = self
            .transition(
                &RecipientFilter::row(notification_id, user_id),
                Transition::Deliver { at },
            )
            .await?;
        if updated == 0 {
            // Missing row is an error; a row already past `created` is not
            let row = self.find_row(notification_id, user_id).await?;
            debug!(
                notification_id,
                user_id,
                status = row.status.as_str(),
                "Delivery confirmation ignored"
            );
        }
        Ok(updated > 0)
    }

    async fn mark_read(
        &self,
        notification_id: &str,
        user_id: &str,
    ) -> NotificationResult<NotificationRead> {
        let at = Utc::now();
        self.transition(
            &RecipientFilter::row(notification_id, user_id).with_statuses(&RecipientStatus::UNREAD),
            Transition::MarkRead { at },
        )
        .await?;

        let row = self.find_row(notification_id, user_id).await?;
        Ok(NotificationRead {
            notification_id: row.notification_id,
            user_id: row.user_id,
            read_at: row.read_at.unwrap_or(at),
        })
    }

    async fn mark_all_read(&self, user_id: &str) -> NotificationResult<u64> {
        let updated = self
            .transition(
                &RecipientFilter::user(user_id).with_statuses(&RecipientStatus::UNREAD),
                Transition::MarkRead { at: Utc::now() },
            )
            .await?;
        debug!(user_id, updated, "Marked all read");
        Ok(updated)
    }

    async fn acknowledge(
        &self,
        notification_id: &str,
        user_id: &str,
    ) -> NotificationResult<NotificationAcknowledged> {
        let notification = self
            .store
            .find_notification(notification_id)
            .await?
            .ok_or_else(|| NotificationError::NotificationNotFound {
                notification_id: notification_id.to_string(),
            })?;
        if !notification.priority.is_top_tier() {
            return Err(NotificationError::NotAcknowledgeable {
                notification_id: notification_id.to_string(),
            });
        }

        let at = Utc::now();
        self.transition(
            &RecipientFilter::row(notification_id, user_id)
                .with_statuses(&RecipientStatus::ACKNOWLEDGEABLE),
            Transition::Acknowledge { at },
        )
        .await?;

        let row = self.find_row(notification_id, user_id).await?;
        Ok(NotificationAcknowledged {
            notification_id: row.notification_id,
            user_id: row.user_id,
            acknowledged_at: row.acknowledged_at.unwrap_or(at),
            read_at: row.read_at.unwrap_or(at),
        })
    }

    async fn unread_count(&self, user_id: &str) -> NotificationResult<u64> {
        let rows = self
            .store
            .select_recipients(
                &RecipientFilter::user(user_id).with_statuses(&RecipientStatus::UNREAD),
            )
            .await?;
        Ok(rows.len() as u64)
    }

    async fn list(&self, user_id: &str, page: Page) -> NotificationResult<InboxPage> {
        let rows = self
            .store
            .select_recipients(&RecipientFilter::user(user_id))
            .await?;
        let joined = self.inbox(rows).await?;
        let total = joined.len() as u64;

        let items = joined
            .iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .map(|(n, row)| row.inbox_item(n))
            .collect();
        Ok(InboxPage { items, total, page })
    }

    async fn history(&self) -> NotificationResult<Vec<HistoryEntry>> {
        let mut notifications = self.store.list_notifications().await?;
        notifications.sort_by(newest_first);
        let rows = self
            .store
            .select_recipients(&RecipientFilter::default())
            .await?;

        let mut by_notification: HashMap<&str, Vec<&Recipient>> = HashMap::new();
        for row in &rows {
            by_notification
                .entry(row.notification_id.as_str())
                .or_default()
                .push(row);
        }

        Ok(notifications
            .iter()
            .map(|n| {
                let rows = by_notification.get(n.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                let reached = |status: RecipientStatus| {
                    rows.iter().filter(|r| r.status.has_reached(status)).count() as u64
                };
                HistoryEntry {
                    notification: n.view(),
                    recipient_count: rows.len() as u64,
                    delivered_count: reached(RecipientStatus::Delivered),
                    read_count: reached(RecipientStatus::Read),
                    acknowledged_count: reached(RecipientStatus::Acknowledged),
                }
            })
            .collect())
    }

    async fn pending_critical(&self, user_id: &str) -> NotificationResult<Vec<InboxItem>> {
        let rows = self
            .store
            .select_recipients(
                &RecipientFilter::user(user_id).with_statuses(&RecipientStatus::ACKNOWLEDGEABLE),
            )
            .await?;
        Ok(self
            .inbox(rows)
            .await?
            .iter()
            .filter(|(n, _)| n.priority.is_top_tier())
            .map(|(n, row)| row.inbox_item(n))
            .collect())
    }
}
