//! # Queue Consumer
//!
//! The consuming side of the transport. A [`Consumer`] pulls deliveries off
//! one queue, decodes each into an [`EventEnvelope`] and hands it to an
//! [`EnvelopeHandler`] on its own task:
//!
//! ```text
//! decode error        → reject (dead-lettered at once, never retried)
//! handler Ok          → ack
//! handler Transient   → nack (retried, dead-lettered at the delivery limit)
//! ```
//!
//! Domain failures are not errors at this level: a handler publishes the
//! matching `*.failed` event and returns `Ok`.

use crate::broker::{BrokerError, InMemoryBroker};
use async_trait::async_trait;
use herald_telemetry::BUS_MESSAGES_CONSUMED;
use shared_types::EventEnvelope;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure reported by a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A failure that may succeed on redelivery (storage, publishing).
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl From<BrokerError> for HandlerError {
    fn from(err: BrokerError) -> Self {
        Self::Transient(err.to_string())
    }
}

/// Processes decoded envelopes from a queue.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync + 'static {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), HandlerError>;
}

/// Consumes one queue until the broker connection closes.
pub struct Consumer<H> {
    broker: Arc<InMemoryBroker>,
    queue: String,
    handler: Arc<H>,
}

impl<H: EnvelopeHandler> Consumer<H> {
    pub fn new(broker: Arc<InMemoryBroker>, queue: impl Into<String>, handler: Arc<H>) -> Self {
        Self {
            broker,
            queue: queue.into(),
            handler,
        }
    }

    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Run the consume loop.
    ///
    /// Only returns on a broker error, which for a closed connection is
    /// [`BrokerError::ConnectionClosed`].
    pub async fn run(self) -> Result<(), BrokerError> {
        info!(queue = %self.queue, "Consumer started");

        loop {
            let delivery = self.broker.next_delivery(&self.queue).await?;

            let envelope = match EventEnvelope::decode(delivery.body()) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(
                        queue = %self.queue,
                        routing_key = delivery.routing_key(),
                        error = %e,
                        "Undecodable message rejected"
                    );
                    BUS_MESSAGES_CONSUMED
                        .with_label_values(&[&self.queue, "reject"])
                        .inc();
                    delivery.reject();
                    continue;
                }
            };

            let handler = Arc::clone(&self.handler);
            let queue = self.queue.clone();
            tokio::spawn(async move {
                let correlation_id = envelope.correlation_id.clone();
                let event_type = envelope.event_type();

                match handler.handle(envelope).await {
                    Ok(()) => {
                        debug!(queue = %queue, %correlation_id, %event_type, "Message handled");
                        BUS_MESSAGES_CONSUMED.with_label_values(&[&queue, "ack"]).inc();
                        delivery.ack();
                    }
                    Err(e) => {
                        warn!(
                            queue = %queue,
                            %correlation_id,
                            %event_type,
                            error = %e,
                            "Handler failed, message will be retried"
                        );
                        BUS_MESSAGES_CONSUMED.with_label_values(&[&queue, "nack"]).inc();
                        delivery.nack();
                    }
                }
            });
        }
    }
}
