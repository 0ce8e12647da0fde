//! # Event Publisher
//!
//! The publishing side of the transport. Services depend on the
//! [`EventPublisher`] trait; [`BrokerPublisher`] encodes envelopes and hands
//! them to the broker.

use crate::broker::{BrokerError, InMemoryBroker};
use async_trait::async_trait;
use herald_telemetry::BUS_MESSAGES_PUBLISHED;
use shared_types::EventEnvelope;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Trait for publishing envelopes to an exchange.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `envelope` to `exchange` under `routing_key`.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), BrokerError>;

    /// Publish under the routing key of the envelope's event type.
    async fn emit(&self, exchange: &str, envelope: &EventEnvelope) -> Result<(), BrokerError> {
        self.publish(exchange, envelope.routing_key(), envelope).await
    }
}

/// Publisher backed by the in-process broker.
pub struct BrokerPublisher {
    broker: Arc<InMemoryBroker>,
    published: AtomicU64,
}

impl BrokerPublisher {
    #[must_use]
    pub fn new(broker: Arc<InMemoryBroker>) -> Self {
        Self {
            broker,
            published: AtomicU64::new(0),
        }
    }

    /// Total envelopes accepted by the broker.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventPublisher for BrokerPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), BrokerError> {
        let body = envelope.encode()?;
        let routed = self.broker.publish(exchange, routing_key, body)?;

        self.published.fetch_add(1, Ordering::Relaxed);
        BUS_MESSAGES_PUBLISHED.with_label_values(&[exchange]).inc();
        debug!(
            exchange,
            routing_key,
            correlation_id = %envelope.correlation_id,
            queues = routed,
            "Envelope published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerConfig, ExchangeKind, QueueArgs};
    use shared_types::{CorrelationId, Event, EventType, UserRef};

    fn setup() -> Arc<InMemoryBroker> {
        let broker = InMemoryBroker::new(BrokerConfig::default());
        broker.declare_exchange("events", ExchangeKind::Topic).unwrap();
        broker.declare_queue("tap", QueueArgs::new()).unwrap();
        broker.bind_queue("tap", "events", "#").unwrap();
        broker
    }

    #[tokio::test]
    async fn test_emit_uses_event_routing_key() {
        let broker = setup();
        let publisher = BrokerPublisher::new(Arc::clone(&broker));
        let envelope = EventEnvelope::new(
            "test",
            CorrelationId::new(),
            Event::NotificationUnreadCountRequested(UserRef::new("u1")),
        );

        publisher.emit("events", &envelope).await.unwrap();

        let delivery = broker.try_get("tap").unwrap().unwrap();
        assert_eq!(delivery.routing_key(), "notification.unreadcount.requested");
        let decoded = EventEnvelope::decode(delivery.body()).unwrap();
        assert_eq!(decoded.event_type(), EventType::NotificationUnreadCountRequested);
        assert_eq!(decoded.correlation_id, envelope.correlation_id);
        delivery.ack();
        assert_eq!(publisher.events_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_to_missing_exchange_fails() {
        let broker = setup();
        let publisher = BrokerPublisher::new(broker);
        let envelope = EventEnvelope::new(
            "test",
            CorrelationId::new(),
            Event::NotificationUnreadCountRequested(UserRef::new("u1")),
        );

        let result = publisher.emit("nope", &envelope).await;
        assert!(matches!(result, Err(BrokerError::UnknownExchange(_))));
        assert_eq!(publisher.events_published(), 0);
    }
}
