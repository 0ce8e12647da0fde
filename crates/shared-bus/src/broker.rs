//! # In-Process Broker
//!
//! AMQP 0-9-1 semantics over in-memory queues: named exchanges (topic or
//! direct), durable queues with arguments, bindings, per-delivery settlement
//! and dead-lettering.
//!
//! ```text
//!  publish(exchange, key)
//!          │
//!          ▼
//!   ┌─────────────┐  binding match   ┌────────────────┐
//!   │  exchange   │ ───────────────→ │ queue (FIFO)   │ ──→ Delivery
//!   └─────────────┘   one copy per   └────────────────┘      │
//!                     matching queue         ▲                │ ack    → removed
//!                                            │ redeliver      │ nack   → count+1, retry or DLX
//!                                            └────────────────│ reject → DLX
//!                                                             │ drop   → head of queue
//! ```
//!
//! A message whose delivery count reaches the queue's `delivery_limit` is
//! routed to the queue's dead-letter exchange with an `x-death` record.
//! Message TTL is enforced lazily when the head of a queue is inspected.

use crate::topic::TopicPattern;
use herald_telemetry::BUS_MESSAGES_DEAD_LETTERED;
use parking_lot::Mutex;
use shared_types::EncodeError;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The connection was closed. Consumers treat this as fatal.
    #[error("Broker connection closed")]
    ConnectionClosed,

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// A redeclaration disagreed with the existing declaration.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Invalid binding pattern: {0:?}")]
    InvalidPattern(String),

    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] EncodeError),
}

/// Exchange routing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Routes on `*`/`#` patterns.
    Topic,
    /// Routes on exact routing key equality.
    Direct,
}

/// Queue arguments (the `x-*` arguments of an AMQP declaration).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueArgs {
    pub dead_letter_exchange: Option<String>,
    pub dead_letter_routing_key: Option<String>,
    /// Deliveries allowed before the message is dead-lettered.
    pub delivery_limit: Option<u32>,
    pub message_ttl: Option<Duration>,
}

impl QueueArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dead_letter(mut self, exchange: &str, routing_key: &str) -> Self {
        self.dead_letter_exchange = Some(exchange.to_string());
        self.dead_letter_routing_key = Some(routing_key.to_string());
        self
    }

    #[must_use]
    pub fn delivery_limit(mut self, limit: u32) -> Self {
        self.delivery_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn message_ttl(mut self, ttl: Duration) -> Self {
        self.message_ttl = Some(ttl);
        self
    }
}

/// Why a message was dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathReason {
    Rejected,
    DeliveryLimit,
    Expired,
}

impl DeathReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::DeliveryLimit => "delivery-limit",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for DeathReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the `x-death` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeathRecord {
    pub queue: String,
    pub reason: DeathReason,
    pub count: u32,
}

/// Message properties carried alongside the body.
#[derive(Debug, Clone)]
pub struct MessageProperties {
    pub content_type: String,
    pub persistent: bool,
    /// `x-delivery-count`: failed deliveries so far.
    pub delivery_count: u32,
    pub redelivered: bool,
    pub x_death: Vec<DeathRecord>,
}

impl Default for MessageProperties {
    fn default() -> Self {
        Self {
            content_type: "application/json".to_string(),
            persistent: true,
            delivery_count: 0,
            redelivered: false,
            x_death: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct Message {
    exchange: String,
    routing_key: String,
    body: Vec<u8>,
    properties: MessageProperties,
    enqueued_at: Instant,
}

struct QueueState {
    args: QueueArgs,
    messages: VecDeque<Message>,
    unacked: usize,
    notify: Arc<Notify>,
}

impl QueueState {
    fn is_expired(&self, message: &Message) -> bool {
        self.args
            .message_ttl
            .is_some_and(|ttl| message.enqueued_at.elapsed() >= ttl)
    }

    /// Pop expired messages off the head.
    fn take_expired(&mut self) -> Vec<Message> {
        let mut expired = Vec::new();
        while let Some(head) = self.messages.front() {
            if !self.is_expired(head) {
                break;
            }
            if let Some(message) = self.messages.pop_front() {
                expired.push(message);
            }
        }
        expired
    }
}

struct Binding {
    exchange: String,
    queue: String,
    pattern: TopicPattern,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeKind>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    closed: bool,
}

/// Broker tuning.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Delay before a nacked message is made available again.
    pub retry_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            retry_delay: crate::DLQ_RETRY_DELAY,
        }
    }
}

/// In-memory AMQP-style broker.
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    config: BrokerConfig,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new(config: BrokerConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BrokerState::default()),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Declare an exchange. Redeclaring with the same kind is a no-op.
    pub fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BrokerError::ConnectionClosed);
        }
        match state.exchanges.get(name) {
            Some(existing) if *existing != kind => Err(BrokerError::PreconditionFailed(format!(
                "exchange {name} already declared as {existing:?}"
            ))),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(name.to_string(), kind);
                debug!(exchange = name, kind = ?kind, "Exchange declared");
                Ok(())
            }
        }
    }

    /// Declare a durable queue. Redeclaring with different arguments fails.
    pub fn declare_queue(&self, name: &str, args: QueueArgs) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BrokerError::ConnectionClosed);
        }
        match state.queues.get(name) {
            Some(existing) if existing.args != args => Err(BrokerError::PreconditionFailed(
                format!("queue {name} already declared with different arguments"),
            )),
            Some(_) => Ok(()),
            None => {
                state.queues.insert(
                    name.to_string(),
                    QueueState {
                        args,
                        messages: VecDeque::new(),
                        unacked: 0,
                        notify: Arc::new(Notify::new()),
                    },
                );
                debug!(queue = name, "Queue declared");
                Ok(())
            }
        }
    }

    /// Bind `queue` to `exchange` with a routing pattern.
    pub fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> Result<(), BrokerError> {
        let pattern = TopicPattern::parse(pattern)?;
        let mut state = self.state.lock();
        if state.closed {
            return Err(BrokerError::ConnectionClosed);
        }
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::UnknownQueue(queue.to_string()));
        }
        let Some(kind) = state.exchanges.get(exchange) else {
            return Err(BrokerError::UnknownExchange(exchange.to_string()));
        };
        if *kind == ExchangeKind::Direct && !pattern.is_literal() {
            return Err(BrokerError::InvalidPattern(pattern.to_string()));
        }

        let exists = state
            .bindings
            .iter()
            .any(|b| b.queue == queue && b.exchange == exchange && b.pattern == pattern);
        if !exists {
            debug!(queue, exchange, pattern = %pattern, "Queue bound");
            state.bindings.push(Binding {
                exchange: exchange.to_string(),
                queue: queue.to_string(),
                pattern,
            });
        }
        Ok(())
    }

    /// Publish a persistent JSON message. Returns the number of queues that
    /// received a copy; unroutable messages are dropped.
    pub fn publish(&self, exchange: &str, routing_key: &str, body: Vec<u8>) -> Result<usize, BrokerError> {
        self.route(exchange, routing_key, body, MessageProperties::default())
    }

    fn route(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        properties: MessageProperties,
    ) -> Result<usize, BrokerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BrokerError::ConnectionClosed);
        }
        let Some(kind) = state.exchanges.get(exchange).copied() else {
            return Err(BrokerError::UnknownExchange(exchange.to_string()));
        };

        let mut targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange)
            .filter(|b| match kind {
                ExchangeKind::Topic => b.pattern.matches(routing_key),
                ExchangeKind::Direct => b.pattern.as_str() == routing_key,
            })
            .map(|b| b.queue.clone())
            .collect();
        targets.sort();
        targets.dedup();

        if targets.is_empty() {
            debug!(exchange, routing_key, "Message unroutable, dropped");
            return Ok(0);
        }

        let now = Instant::now();
        for name in &targets {
            if let Some(queue) = state.queues.get_mut(name) {
                queue.messages.push_back(Message {
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                    body: body.clone(),
                    properties: properties.clone(),
                    enqueued_at: now,
                });
                queue.notify.notify_waiters();
            }
        }
        Ok(targets.len())
    }

    /// Take the next live message without waiting.
    pub fn try_get(self: &Arc<Self>, queue: &str) -> Result<Option<Delivery>, BrokerError> {
        let (message, expired) = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(BrokerError::ConnectionClosed);
            }
            let q = state
                .queues
                .get_mut(queue)
                .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
            let expired = q.take_expired();
            let message = q.messages.pop_front();
            if message.is_some() {
                q.unacked += 1;
            }
            (message, expired)
        };

        for message in expired {
            self.dead_letter(queue, message, DeathReason::Expired);
        }

        Ok(message.map(|message| Delivery {
            broker: Arc::clone(self),
            queue: queue.to_string(),
            message: Some(message),
        }))
    }

    /// Wait for the next message on `queue`.
    ///
    /// Returns [`BrokerError::ConnectionClosed`] once the broker is closed.
    pub async fn next_delivery(self: &Arc<Self>, queue: &str) -> Result<Delivery, BrokerError> {
        let notify = {
            let state = self.state.lock();
            state
                .queues
                .get(queue)
                .map(|q| Arc::clone(&q.notify))
                .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?
        };

        loop {
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.try_get(queue)? {
                return Ok(delivery);
            }

            // Wake up for the next TTL expiry even if nothing is published
            match self.next_expiry(queue) {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    fn next_expiry(&self, queue: &str) -> Option<Instant> {
        let state = self.state.lock();
        let q = state.queues.get(queue)?;
        let ttl = q.args.message_ttl?;
        q.messages.front().map(|m| m.enqueued_at + ttl)
    }

    /// Ready messages in `queue` (expired messages are purged first).
    pub fn queue_depth(&self, queue: &str) -> Result<usize, BrokerError> {
        let (depth, expired) = {
            let mut state = self.state.lock();
            let q = state
                .queues
                .get_mut(queue)
                .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
            let expired = q.take_expired();
            (q.messages.len(), expired)
        };
        for message in expired {
            self.dead_letter(queue, message, DeathReason::Expired);
        }
        Ok(depth)
    }

    /// Deliveries handed out and not yet settled.
    pub fn unacked(&self, queue: &str) -> Result<usize, BrokerError> {
        let state = self.state.lock();
        state
            .queues
            .get(queue)
            .map(|q| q.unacked)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))
    }

    /// Close the connection. Waiting consumers wake with `ConnectionClosed`.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        for queue in state.queues.values() {
            queue.notify.notify_waiters();
        }
        warn!("Broker connection closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn settle(&self, queue: &str) {
        let mut state = self.state.lock();
        if let Some(q) = state.queues.get_mut(queue) {
            q.unacked = q.unacked.saturating_sub(1);
        }
    }

    fn delivery_limit(&self, queue: &str) -> Option<u32> {
        let state = self.state.lock();
        state.queues.get(queue).and_then(|q| q.args.delivery_limit)
    }

    fn enqueue(&self, queue: &str, mut message: Message, at_front: bool) {
        let mut state = self.state.lock();
        if state.closed {
            debug!(queue, "Broker closed, redelivery dropped");
            return;
        }
        if let Some(q) = state.queues.get_mut(queue) {
            message.enqueued_at = Instant::now();
            if at_front {
                q.messages.push_front(message);
            } else {
                q.messages.push_back(message);
            }
            q.notify.notify_waiters();
        }
    }

    /// Count a failed delivery and either schedule a retry or dead-letter.
    fn fail_delivery(self: &Arc<Self>, queue: &str, mut message: Message, delay: Duration) {
        message.properties.delivery_count += 1;
        message.properties.redelivered = true;

        if let Some(limit) = self.delivery_limit(queue) {
            if message.properties.delivery_count >= limit {
                self.dead_letter(queue, message, DeathReason::DeliveryLimit);
                return;
            }
        }

        if delay.is_zero() {
            self.enqueue(queue, message, true);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let broker = Arc::clone(self);
                let queue = queue.to_string();
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    broker.enqueue(&queue, message, false);
                });
            }
            Err(_) => self.enqueue(queue, message, false),
        }
    }

    fn dead_letter(&self, queue: &str, mut message: Message, reason: DeathReason) {
        let target = {
            let state = self.state.lock();
            state.queues.get(queue).and_then(|q| {
                q.args
                    .dead_letter_exchange
                    .clone()
                    .map(|dlx| (dlx, q.args.dead_letter_routing_key.clone()))
            })
        };

        let Some((dlx, dl_routing_key)) = target else {
            if reason == DeathReason::Expired {
                debug!(queue, routing_key = %message.routing_key, "Message expired");
            } else {
                error!(
                    queue,
                    routing_key = %message.routing_key,
                    reason = %reason,
                    "Message discarded, queue has no dead-letter exchange"
                );
            }
            return;
        };

        match message
            .properties
            .x_death
            .iter_mut()
            .find(|d| d.queue == queue && d.reason == reason)
        {
            Some(record) => record.count += 1,
            None => message.properties.x_death.insert(
                0,
                DeathRecord {
                    queue: queue.to_string(),
                    reason,
                    count: 1,
                },
            ),
        }

        BUS_MESSAGES_DEAD_LETTERED
            .with_label_values(&[queue, reason.as_str()])
            .inc();
        warn!(
            queue,
            routing_key = %message.routing_key,
            reason = %reason,
            deliveries = message.properties.delivery_count,
            "Message dead-lettered"
        );

        let routing_key = dl_routing_key.unwrap_or_else(|| message.routing_key.clone());
        message.properties.redelivered = false;
        if let Err(e) = self.route(&dlx, &routing_key, message.body, message.properties) {
            error!(queue, dlx = %dlx, error = %e, "Dead-letter routing failed");
        }
    }
}

/// A message handed to a consumer.
///
/// Must be settled with [`ack`](Self::ack), [`nack`](Self::nack) or
/// [`reject`](Self::reject). Dropping an unsettled delivery returns it to
/// the head of its queue as a failed delivery.
pub struct Delivery {
    broker: Arc<InMemoryBroker>,
    queue: String,
    message: Option<Message>,
}

impl Delivery {
    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.message
            .as_ref()
            .map(|m| m.body.as_slice())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn routing_key(&self) -> &str {
        self.message.as_ref().map_or("", |m| m.routing_key.as_str())
    }

    #[must_use]
    pub fn exchange(&self) -> &str {
        self.message.as_ref().map_or("", |m| m.exchange.as_str())
    }

    #[must_use]
    pub fn properties(&self) -> Option<&MessageProperties> {
        self.message.as_ref().map(|m| &m.properties)
    }

    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Positive acknowledgement: the message is removed.
    pub fn ack(mut self) {
        if self.message.take().is_some() {
            self.broker.settle(&self.queue);
        }
    }

    /// Negative acknowledgement with requeue.
    ///
    /// The delivery count is incremented; below the queue's delivery limit the
    /// message returns to the tail after the retry delay, otherwise it is
    /// dead-lettered.
    pub fn nack(mut self) {
        if let Some(message) = self.message.take() {
            self.broker.settle(&self.queue);
            let delay = self.broker.config.retry_delay;
            self.broker.fail_delivery(&self.queue, message, delay);
        }
    }

    /// Reject without requeue: the message is dead-lettered immediately.
    pub fn reject(mut self) {
        if let Some(message) = self.message.take() {
            self.broker.settle(&self.queue);
            self.broker
                .dead_letter(&self.queue, message, DeathReason::Rejected);
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(message) = self.message.take() {
            self.broker.settle(&self.queue);
            self.broker
                .fail_delivery(&self.queue, message, Duration::ZERO);
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("queue", &self.queue)
            .field("routing_key", &self.routing_key())
            .field("properties", &self.properties())
            .finish()
    }
}
