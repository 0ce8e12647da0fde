//! # Realtime Push Boundary
//!
//! Bridges domain events to connected user sessions.
//!
//! ```text
//! notification.created ──→ PushGateway ──push──→ recipient sessions
//!                              │
//!                              └──notification.delivered──→ Notifications (2)
//! notification.read ─────────→ PushGateway ──push──→ user sessions
//! notification.acknowledged ─→ PushGateway ──push──→ user sessions
//! ```
//!
//! A recipient without a live session receives nothing and its row stays
//! `created`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use shared_bus::{EnvelopeHandler, EventPublisher, HandlerError};
use shared_types::{
    Delivered, Event, EventEnvelope, NotificationAcknowledged, NotificationCreated,
    NotificationRead, NotificationView,
};
use tokio::sync::mpsc;
use tracing::debug;

/// Source name stamped on envelopes published by the push edge.
pub const SERVICE_NAME: &str = "realtime-service";

/// Session identifier.
pub type SessionId = u64;

/// A message sent down a session.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    New(NotificationView),
    Read(NotificationRead),
    Acknowledged(NotificationAcknowledged),
}

struct Session {
    user_id: String,
    sender: mpsc::UnboundedSender<PushMessage>,
}

/// Connected sessions, indexed by user.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
    by_user: DashMap<String, Vec<SessionId>>,
    id_counter: AtomicU64,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `user_id`.
    pub fn connect(&self, user_id: &str) -> (SessionId, mpsc::UnboundedReceiver<PushMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst) + 1;

        self.sessions.insert(
            id,
            Session {
                user_id: user_id.to_string(),
                sender,
            },
        );
        self.by_user.entry(user_id.to_string()).or_default().push(id);

        debug!(session_id = id, user_id, "Session connected");
        (id, receiver)
    }

    pub fn disconnect(&self, session_id: SessionId) -> bool {
        let Some((_, session)) = self.sessions.remove(&session_id) else {
            return false;
        };
        let now_empty = match self.by_user.get_mut(&session.user_id) {
            Some(mut ids) => {
                ids.retain(|id| *id != session_id);
                ids.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.by_user.remove_if(&session.user_id, |_, ids| ids.is_empty());
        }

        debug!(session_id, user_id = %session.user_id, "Session disconnected");
        true
    }

    #[must_use]
    pub fn is_connected(&self, user_id: &str) -> bool {
        self.by_user.get(user_id).is_some_and(|ids| !ids.is_empty())
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Send to every live session of `user_id`, pruning closed ones.
    ///
    /// Returns the number of sessions reached.
    pub fn send_to_user(&self, user_id: &str, message: &PushMessage) -> usize {
        let ids = self
            .by_user
            .get(user_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();

        let mut reached = 0;
        for id in ids {
            let sent = self
                .sessions
                .get(&id)
                .is_some_and(|session| session.sender.send(message.clone()).is_ok());
            if sent {
                reached += 1;
            } else {
                self.disconnect(id);
            }
        }
        reached
    }
}

/// Consumes push-queue events and fans them out to sessions.
pub struct PushGateway {
    sessions: SessionRegistry,
    publisher: Arc<dyn EventPublisher>,
    exchange: String,
    pushed: AtomicU64,
}

impl PushGateway {
    pub fn new(publisher: Arc<dyn EventPublisher>, exchange: impl Into<String>) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            publisher,
            exchange: exchange.into(),
            pushed: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Messages handed to sessions so far.
    #[must_use]
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    fn push(&self, user_id: &str, message: &PushMessage) -> bool {
        let reached = self.sessions.send_to_user(user_id, message);
        self.pushed.fetch_add(reached as u64, Ordering::Relaxed);
        reached > 0
    }

    async fn on_created(
        &self,
        envelope: &EventEnvelope,
        created: &NotificationCreated,
    ) -> Result<(), HandlerError> {
        let message = PushMessage::New(created.notification.clone());
        for recipient_id in &created.recipient_ids {
            if !self.push(recipient_id, &message) {
                continue;
            }
            let delivered = Delivered {
                notification_id: created.notification.id.clone(),
                recipient_id: recipient_id.clone(),
                delivered_at: Some(Utc::now()),
            };
            let confirmation = envelope.reply(SERVICE_NAME, Event::NotificationDelivered(delivered));
            self.publisher.emit(&self.exchange, &confirmation).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EnvelopeHandler for PushGateway {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), HandlerError> {
        match &envelope.event {
            Event::NotificationCreated(created) => self.on_created(&envelope, created).await,
            Event::NotificationRead(read) => {
                self.push(&read.user_id, &PushMessage::Read(read.clone()));
                Ok(())
            }
            Event::NotificationAcknowledged(acked) => {
                self.push(&acked.user_id, &PushMessage::Acknowledged(acked.clone()));
                Ok(())
            }
            other => {
                debug!(event_type = %other.event_type(), "Ignoring event not pushed to clients");
                Ok(())
            }
        }
    }
}
