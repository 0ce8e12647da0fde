//! IPC Handler for the notification service
//!
//! | Request | Success | Failure |
//! |---------|---------|---------|
//! | `notification.create.requested` | `notification.created` | `notification.create.failed` |
//! | `notification.list.requested` | `notification.list.succeeded` | `notification.list.failed` |
//! | `notification.markread.requested` | `notification.read` | `notification.markread.failed` |
//! | `notification.markallread.requested` | `notification.markallread.succeeded` | `notification.markallread.failed` |
//! | `notification.acknowledge.requested` | `notification.acknowledged` | `notification.acknowledge.failed` |
//! | `notification.unreadcount.requested` | `notification.unreadcount.succeeded` | `notification.unreadcount.failed` |
//! | `notification.history.requested` | `notification.history.succeeded` | |
//! | `notification.pendingcritical.requested` | `notification.pendingcritical.succeeded` | `notification.pendingcritical.failed` |
//!
//! Requests missing a required id are answered with the failure event
//! (`bad_request`), never dead-lettered.
//! | `notification.delivered` | | `notification.deliver.failed` |
//!
//! `user.list.succeeded` and `user.list.failed` are replies to broadcast
//! resolution and are handed to the [`CorrelationBroker`].

use crate::domain::Draft;
use crate::error::NotificationError;
use crate::ports::{NotificationApi, Page};
use async_trait::async_trait;
use shared_bus::{CorrelationBroker, EnvelopeHandler, EventPublisher, HandlerError};
use shared_types::{
    Event, EventEnvelope, FailurePayload, MarkAllReadSucceeded, NotificationHistory,
    NotificationList, PendingCritical, RecipientRef, UnreadCount,
};
use std::sync::Arc;
use tracing::debug;

/// Source name stamped on every envelope this service publishes.
pub const SERVICE_NAME: &str = "notification-service";

/// Bus adapter for [`NotificationApi`].
pub struct NotificationEventHandler<A>
where
    A: NotificationApi,
{
    api: Arc<A>,
    correlation: Arc<CorrelationBroker>,
    publisher: Arc<dyn EventPublisher>,
    exchange: String,
}

impl<A> NotificationEventHandler<A>
where
    A: NotificationApi,
{
    pub fn new(
        api: Arc<A>,
        correlation: Arc<CorrelationBroker>,
        publisher: Arc<dyn EventPublisher>,
        exchange: impl Into<String>,
    ) -> Self {
        Self {
            api,
            correlation,
            publisher,
            exchange: exchange.into(),
        }
    }

    async fn reply(&self, request: &EventEnvelope, event: Event) -> Result<(), HandlerError> {
        let reply = request.reply(SERVICE_NAME, event);
        self.publisher.emit(&self.exchange, &reply).await?;
        Ok(())
    }

    /// Publish a failure event, or hand retryable errors back for redelivery.
    async fn fail(
        &self,
        request: &EventEnvelope,
        error: NotificationError,
        to_event: fn(FailurePayload) -> Event,
    ) -> Result<(), HandlerError> {
        if error.kind().is_retryable() {
            return Err(HandlerError::Transient(error.to_string()));
        }
        debug!(
            correlation_id = %request.correlation_id,
            event_type = %request.event_type(),
            reason = %error,
            "Notification request rejected"
        );
        let mut payload = FailurePayload::new(error.code(), error.reason());
        if let Some(id) = error.notification_id() {
            payload = payload.with_notification(id);
        }
        self.reply(request, to_event(payload)).await
    }

    /// History has no failure event, so every error it hits is retryable.
    fn retry(error: NotificationError) -> HandlerError {
        HandlerError::Transient(error.to_string())
    }

    async fn dispatch(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        match &envelope.event {
            Event::NotificationCreateRequested(request) => {
                let result = match Draft::try_from(request.clone()) {
                    Ok(draft) => self.api.create(&envelope.correlation_id, draft).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(created) => self.reply(envelope, Event::NotificationCreated(created)).await,
                    Err(e) => self.fail(envelope, e, Event::NotificationCreateFailed).await,
                }
            }
            Event::NotificationListRequested(request) => {
                let result = match user(&request.user_id) {
                    Ok(user_id) => self
                        .api
                        .list(user_id, Page::new(request.page, request.limit))
                        .await
                        .map(|inbox| NotificationList {
                            user_id: user_id.to_string(),
                            notifications: inbox.items,
                            total: inbox.total,
                            page: inbox.page.page,
                            limit: inbox.page.limit,
                        }),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(list) => self.reply(envelope, Event::NotificationListSucceeded(list)).await,
                    Err(e) => self.fail(envelope, e, Event::NotificationListFailed).await,
                }
            }
            Event::NotificationMarkReadRequested(target) => {
                let result = match recipient(target) {
                    Ok((notification_id, user_id)) => {
                        self.api.mark_read(notification_id, user_id).await
                    }
                    Err(e) => Err(e),
                };
                match result {
                    Ok(read) => self.reply(envelope, Event::NotificationRead(read)).await,
                    Err(e) => self.fail(envelope, e, Event::NotificationMarkReadFailed).await,
                }
            }
            Event::NotificationMarkAllReadRequested(request) => {
                let result = match user(&request.user_id) {
                    Ok(user_id) => self.api.mark_all_read(user_id).await.map(|updated| {
                        MarkAllReadSucceeded {
                            user_id: user_id.to_string(),
                            updated,
                        }
                    }),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(succeeded) => {
                        self.reply(envelope, Event::NotificationMarkAllReadSucceeded(succeeded))
                            .await
                    }
                    Err(e) => self.fail(envelope, e, Event::NotificationMarkAllReadFailed).await,
                }
            }
            Event::NotificationAcknowledgeRequested(target) => {
                let result = match recipient(target) {
                    Ok((notification_id, user_id)) => {
                        self.api.acknowledge(notification_id, user_id).await
                    }
                    Err(e) => Err(e),
                };
                match result {
                    Ok(acked) => self.reply(envelope, Event::NotificationAcknowledged(acked)).await,
                    Err(e) => self.fail(envelope, e, Event::NotificationAcknowledgeFailed).await,
                }
            }
            Event::NotificationUnreadCountRequested(request) => {
                let result = match user(&request.user_id) {
                    Ok(user_id) => self.api.unread_count(user_id).await.map(|count| UnreadCount {
                        user_id: user_id.to_string(),
                        count,
                    }),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(unread) => {
                        self.reply(envelope, Event::NotificationUnreadCountSucceeded(unread))
                            .await
                    }
                    Err(e) => self.fail(envelope, e, Event::NotificationUnreadCountFailed).await,
                }
            }
            Event::NotificationHistoryRequested(_) => {
                let notifications = self.api.history().await.map_err(Self::retry)?;
                let history = NotificationHistory {
                    total: notifications.len() as u64,
                    notifications,
                };
                self.reply(envelope, Event::NotificationHistorySucceeded(history))
                    .await
            }
            Event::NotificationPendingCriticalRequested(request) => {
                let result = match user(&request.user_id) {
                    Ok(user_id) => self.api.pending_critical(user_id).await.map(|notifications| {
                        PendingCritical {
                            user_id: user_id.to_string(),
                            notifications,
                        }
                    }),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(pending) => {
                        self.reply(envelope, Event::NotificationPendingCriticalSucceeded(pending))
                            .await
                    }
                    Err(e) => {
                        self.fail(envelope, e, Event::NotificationPendingCriticalFailed)
                            .await
                    }
                }
            }
            Event::NotificationDelivered(delivered) => {
                match self
                    .api
                    .deliver(
                        &delivered.notification_id,
                        &delivered.recipient_id,
                        delivered.delivered_at,
                    )
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(e) => self.fail(envelope, e, Event::NotificationDeliverFailed).await,
                }
            }
            Event::UserListSucceeded(_) | Event::UserListFailed(_) => {
                self.correlation.resolve(envelope.clone());
                Ok(())
            }
            other => {
                debug!(event_type = %other.event_type(), "Ignoring event not addressed to notifications");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<A> EnvelopeHandler for NotificationEventHandler<A>
where
    A: NotificationApi + 'static,
{
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), HandlerError> {
        self.dispatch(&envelope).await
    }
}

// =============================================================================
// REQUEST FIELDS
// =============================================================================

/// Present and non-blank.
fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn recipient(target: &RecipientRef) -> Result<(&str, &str), NotificationError> {
    match (required(&target.notification_id), required(&target.user_id)) {
        (Some(notification_id), Some(user_id)) => Ok((notification_id, user_id)),
        _ => Err(NotificationError::MissingFields {
            fields: vec!["notificationId", "userId"],
        }),
    }
}

fn user(user_id: &Option<String>) -> Result<&str, NotificationError> {
    required(user_id).ok_or_else(|| NotificationError::MissingFields {
        fields: vec!["userId"],
    })
}
