//! # Shared Bus - Message Transport for Herald Services
//!
//! Services never call each other directly. Every interaction is an
//! [`EventEnvelope`](shared_types::EventEnvelope) published to the topic
//! exchange and consumed from a durable, service-owned queue.
//!
//! ```text
//! ┌───────────────────┐                         ┌───────────────────┐
//! │ notification svc  │  notification.created   │   realtime push   │
//! │                   │ ─────────┐              │                   │
//! └───────────────────┘          │              └───────────────────┘
//!         ▲                      ▼                        ▲
//!         │              ┌──────────────┐                 │
//!         └───────────── │ herald.events│ ────────────────┘
//!           bindings     │   (topic)    │   bindings
//!                        └──────┬───────┘
//!                               │ nack ×3 / reject
//!                               ▼
//!                        ┌──────────────┐     ┌──────────────────┐
//!                        │  herald.dlx  │ ──→ │ <service>.dlq    │
//!                        │   (direct)   │     │ (TTL 30 s)       │
//!                        └──────────────┘     └──────────────────┘
//! ```
//!
//! ## Components
//!
//! - [`broker`]: in-process exchanges, queues, settlement, dead-lettering
//! - [`publisher`]: envelope encoding and publishing
//! - [`subscriber`]: per-queue consume loop driving an [`EnvelopeHandler`]
//! - [`correlation`]: request/reply matching by correlation id

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod broker;
pub mod correlation;
pub mod publisher;
pub mod subscriber;
pub mod topic;

use std::time::Duration;

// Re-export main types
pub use broker::{
    BrokerConfig, BrokerError, DeathReason, DeathRecord, Delivery, ExchangeKind, InMemoryBroker,
    MessageProperties, QueueArgs,
};
pub use correlation::{CorrelationBroker, CorrelationError, CorrelationStats};
pub use publisher::{BrokerPublisher, EventPublisher};
pub use subscriber::{Consumer, EnvelopeHandler, HandlerError};
pub use topic::TopicPattern;

/// Topic exchange carrying every domain event.
pub const DEFAULT_EXCHANGE: &str = "herald.events";

/// Direct exchange receiving dead-lettered messages.
pub const DEAD_LETTER_EXCHANGE: &str = "herald.dlx";

/// Failed deliveries allowed before a message is dead-lettered.
pub const DLQ_MAX_RETRIES: u32 = 3;

/// Delay before a nacked message is redelivered.
pub const DLQ_RETRY_DELAY: Duration = Duration::from_millis(5_000);

/// How long dead-lettered messages are kept for inspection.
pub const DLQ_MESSAGE_TTL: Duration = Duration::from_millis(30_000);

/// Default wait for a correlated reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Dead-letter queue name for a service.
#[must_use]
pub fn dead_letter_queue_name(service: &str) -> String {
    format!("{service}.dlq")
}

/// Declare a service's work queue together with its dead-letter queue.
///
/// The DLX is declared as a direct exchange; the DLQ is bound to it under the
/// service name and expires messages after `dlq_ttl`. The work queue
/// dead-letters into the DLX after `max_retries` failed deliveries.
pub fn declare_service_queue(
    broker: &InMemoryBroker,
    service: &str,
    queue: &str,
    dlx: &str,
    max_retries: u32,
    dlq_ttl: Duration,
) -> Result<(), BrokerError> {
    let dlq = dead_letter_queue_name(service);

    broker.declare_exchange(dlx, ExchangeKind::Direct)?;
    broker.declare_queue(&dlq, QueueArgs::new().message_ttl(dlq_ttl))?;
    broker.bind_queue(&dlq, dlx, service)?;
    broker.declare_queue(
        queue,
        QueueArgs::new()
            .dead_letter(dlx, service)
            .delivery_limit(max_retries),
    )?;

    tracing::info!(service, queue, dlq = %dlq, max_retries, "Service queue declared");
    Ok(())
}
