//! # Test Harness
//!
//! Starts a [`NodeRuntime`] and binds an outcome queue to every outcome routing
//! key, standing in for the HTTP gateway:
//!
//! ```text
//! TestNode ──*.requested──→ herald.events ──→ service queues
//!    ↑                                             │
//!    └──────── test-outcomes ← *.succeeded / *.failed / notification.<state>
//! ```
//!
//! Outcomes that arrive while the test is waiting for a different one are
//! kept in a backlog, so the order of `wait_for` calls does not matter.

use std::sync::Arc;
use std::time::Duration;

use node_runtime::container::{NodeConfig, ServiceContainer};
use node_runtime::NodeRuntime;
use shared_bus::{dead_letter_queue_name, MessageProperties, QueueArgs};
use shared_types::{CorrelationId, Event, EventEnvelope, RegisterRequest, RegisterSucceeded};
use tokio::time::Instant;

pub const OUTCOME_QUEUE: &str = "test-outcomes";

/// Source stamped on requests published by the harness.
pub const GATEWAY: &str = "api-gateway";

/// Upper bound for any single expected event.
pub const WAIT: Duration = Duration::from_secs(5);

const OUTCOME_BINDINGS: [&str; 5] = [
    "#.succeeded",
    "#.failed",
    "notification.created",
    "notification.read",
    "notification.acknowledged",
];

/// Default configuration with retries and timeouts short enough for tests.
#[must_use]
pub fn fast_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.bus.retry_delay = Duration::from_millis(20);
    config.bus.broadcast_timeout = Duration::from_millis(500);
    config
}

/// A message drained from a dead-letter queue.
#[derive(Debug)]
pub struct DeadLetter {
    pub routing_key: String,
    pub body: Vec<u8>,
    pub properties: MessageProperties,
}

pub struct TestNode {
    runtime: NodeRuntime,
    container: Arc<ServiceContainer>,
    backlog: Vec<EventEnvelope>,
}

impl TestNode {
    pub async fn start() -> Self {
        Self::start_with(fast_config()).await
    }

    pub async fn start_with(config: NodeConfig) -> Self {
        let runtime = NodeRuntime::new(config);
        runtime.start().await.expect("runtime starts");
        let container = runtime.container();

        let exchange = container.config.bus.exchange.clone();
        container
            .broker
            .declare_queue(OUTCOME_QUEUE, QueueArgs::new())
            .expect("outcome queue");
        for pattern in OUTCOME_BINDINGS {
            container
                .broker
                .bind_queue(OUTCOME_QUEUE, &exchange, pattern)
                .expect("outcome binding");
        }

        Self {
            runtime,
            container,
            backlog: Vec::new(),
        }
    }

    #[must_use]
    pub fn container(&self) -> &ServiceContainer {
        &self.container
    }

    #[must_use]
    pub fn runtime(&self) -> &NodeRuntime {
        &self.runtime
    }

    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.container.config.bus.exchange
    }

    /// Publish a request under a fresh correlation id.
    pub fn send(&self, event: Event) -> CorrelationId {
        let correlation_id = CorrelationId::new();
        self.send_with(&correlation_id, event);
        correlation_id
    }

    pub fn send_with(&self, correlation_id: &CorrelationId, event: Event) {
        let envelope = EventEnvelope::new(GATEWAY, correlation_id.clone(), event);
        let body = envelope.encode().expect("request encodes");
        self.publish_raw(envelope.routing_key(), body);
    }

    /// Publish arbitrary bytes, bypassing the codec.
    pub fn publish_raw(&self, routing_key: &str, body: Vec<u8>) {
        self.container
            .broker
            .publish(self.exchange(), routing_key, body)
            .expect("publish");
    }

    /// Wait for the first outcome matching `predicate`.
    pub async fn wait_for<F>(&mut self, predicate: F) -> EventEnvelope
    where
        F: Fn(&EventEnvelope) -> bool,
    {
        if let Some(pos) = self.backlog.iter().position(&predicate) {
            return self.backlog.remove(pos);
        }

        let deadline = Instant::now() + WAIT;
        loop {
            let delivery = tokio::time::timeout_at(
                deadline,
                self.container.broker.next_delivery(OUTCOME_QUEUE),
            )
            .await
            .expect("timed out waiting for an outcome event")
            .expect("broker open");
            let envelope = EventEnvelope::decode(delivery.body()).expect("outcome envelope decodes");
            delivery.ack();

            if predicate(&envelope) {
                return envelope;
            }
            self.backlog.push(envelope);
        }
    }

    /// Wait for the outcome of the request published under `correlation_id`.
    ///
    /// `user.list.*` replies share the id of the broadcast that caused them
    /// and are skipped.
    pub async fn reply_to(&mut self, correlation_id: &CorrelationId) -> EventEnvelope {
        let correlation_id = correlation_id.clone();
        self.wait_for(move |envelope| {
            envelope.correlation_id == correlation_id
                && !matches!(
                    envelope.event,
                    Event::UserListSucceeded(_) | Event::UserListFailed(_)
                )
        })
        .await
    }

    pub async fn request(&mut self, event: Event) -> EventEnvelope {
        let correlation_id = self.send(event);
        self.reply_to(&correlation_id).await
    }

    /// Everything the outcome queue has seen and not yet claimed.
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        let mut drained = std::mem::take(&mut self.backlog);
        while let Some(delivery) = self.container.broker.try_get(OUTCOME_QUEUE).expect("outcome queue open") {
            if let Ok(envelope) = EventEnvelope::decode(delivery.body()) {
                drained.push(envelope);
            }
            delivery.ack();
        }
        drained
    }

    pub async fn register(&mut self, name: &str, email: &str) -> RegisterSucceeded {
        let reply = self
            .request(Event::UserRegisterRequested(RegisterRequest {
                name: Some(name.to_string()),
                email: Some(email.to_string()),
                password: Some("correct-horse".to_string()),
                role: None,
            }))
            .await;
        match reply.event {
            Event::UserRegisterSucceeded(succeeded) => succeeded,
            other => panic!("registration failed: {other:?}"),
        }
    }

    /// Poll `condition` until it holds or [`WAIT`] elapses.
    pub async fn wait_until<F>(&self, mut condition: F)
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + WAIT;
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Ready messages in `service`'s dead-letter queue.
    #[must_use]
    pub fn dead_letter_depth(&self, service: &str) -> usize {
        self.container
            .broker
            .queue_depth(&dead_letter_queue_name(service))
            .expect("dead-letter queue")
    }

    /// Remove and return every message in `service`'s dead-letter queue.
    pub fn take_dead_letters(&self, service: &str) -> Vec<DeadLetter> {
        let queue = dead_letter_queue_name(service);
        let mut letters = Vec::new();
        while let Some(delivery) = self.container.broker.try_get(&queue).expect("dlq") {
            letters.push(DeadLetter {
                routing_key: delivery.routing_key().to_string(),
                body: delivery.body().to_vec(),
                properties: delivery.properties().cloned().unwrap_or_default(),
            });
            delivery.ack();
        }
        letters
    }

    pub async fn stop(self) {
        self.runtime.shutdown().await;
    }
}
