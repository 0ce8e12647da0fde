//! # Broker Topology
//!
//! Exchanges, queues and bindings declared at start-up.
//!
//! ```text
//!                        ┌──────────────────────────────┐
//!                        │     herald.events (topic)    │
//!                        └──────────────┬───────────────┘
//!        ┌──────────────────────────────┼──────────────────────────────┐
//!        ▼                              ▼                              ▼
//! notification-service-queue    user-service-queue            realtime-push-queue
//!        │ x-delivery-limit             │ x-delivery-limit
//!        ▼                              ▼
//! ┌──────────────────────────────────────────────┐
//! │              herald.dlx (direct)             │
//! └──────┬───────────────────────────────┬───────┘
//!        ▼                               ▼
//! notification-service.dlq        user-service.dlq        (x-message-ttl)
//! ```
//!
//! Bindings are narrow so that no service consumes its own outcome events.

use shared_bus::{declare_service_queue, BrokerError, ExchangeKind, InMemoryBroker, QueueArgs};
use tracing::info;

use crate::container::config::BusConfig;

pub const NOTIFICATION_SERVICE: &str = "notification-service";
pub const USER_SERVICE: &str = "user-service";

pub const NOTIFICATION_QUEUE: &str = "notification-service-queue";
pub const USER_QUEUE: &str = "user-service-queue";
pub const PUSH_QUEUE: &str = "realtime-push-queue";

pub const NOTIFICATION_BINDINGS: [&str; 4] = [
    "notification.*.requested",
    "notification.delivered",
    "user.list.succeeded",
    "user.list.failed",
];

pub const USER_BINDINGS: [&str; 1] = ["user.#.requested"];

pub const PUSH_BINDINGS: [&str; 3] = [
    "notification.created",
    "notification.read",
    "notification.acknowledged",
];

/// Declare the full topology. Idempotent.
pub fn declare_topology(broker: &InMemoryBroker, bus: &BusConfig) -> Result<(), BrokerError> {
    broker.declare_exchange(&bus.exchange, ExchangeKind::Topic)?;

    for (service, queue) in [
        (NOTIFICATION_SERVICE, NOTIFICATION_QUEUE),
        (USER_SERVICE, USER_QUEUE),
    ] {
        declare_service_queue(
            broker,
            service,
            queue,
            &bus.dead_letter_exchange,
            bus.delivery_limit,
            bus.dlq_ttl,
        )?;
    }
    broker.declare_queue(PUSH_QUEUE, QueueArgs::new().delivery_limit(bus.delivery_limit))?;

    let bindings: [(&str, &[&str]); 3] = [
        (NOTIFICATION_QUEUE, &NOTIFICATION_BINDINGS),
        (USER_QUEUE, &USER_BINDINGS),
        (PUSH_QUEUE, &PUSH_BINDINGS),
    ];
    for (queue, patterns) in bindings {
        for pattern in patterns {
            broker.bind_queue(queue, &bus.exchange, pattern)?;
        }
    }

    info!(exchange = %bus.exchange, dlx = %bus.dead_letter_exchange, "Broker topology declared");
    Ok(())
}
