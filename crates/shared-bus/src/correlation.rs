//! # Correlation Broker
//!
//! Request/reply over the topic exchange. Maps correlation ids to waiting
//! callers:
//!
//! 1. `request()` registers the id and a oneshot sender
//! 2. the request envelope is published under its event's routing key
//! 3. the reply arrives on the caller's queue and the handler calls `resolve()`
//! 4. `request()` returns the reply, or times out and forgets the id
//!
//! A reply for an id that is no longer pending is dropped.

use crate::broker::BrokerError;
use crate::publisher::EventPublisher;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use herald_telemetry::{CORRELATION_PENDING, CORRELATION_TIMEOUTS};
use shared_types::{CorrelationId, Event, EventEnvelope, EventType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Errors from correlated requests.
#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error("No reply for {correlation_id} within {waited_ms} ms")]
    Timeout {
        correlation_id: CorrelationId,
        waited_ms: u64,
    },

    #[error("A request with correlation id {0} is already pending")]
    Duplicate(CorrelationId),

    #[error("Failed to publish request: {0}")]
    Publish(#[from] BrokerError),

    /// The pending entry was removed without a reply.
    #[error("Request {0} was cancelled")]
    Cancelled(CorrelationId),
}

struct PendingReply {
    sender: oneshot::Sender<EventEnvelope>,
    created_at: Instant,
    request_type: EventType,
}

/// Statistics for the correlation broker
#[derive(Debug, Default)]
pub struct CorrelationStats {
    pub total_requests: AtomicU64,
    pub total_resolved: AtomicU64,
    pub total_timeouts: AtomicU64,
    /// Replies that arrived for unknown or expired ids.
    pub total_unmatched: AtomicU64,
}

/// Tracks outstanding requests and matches replies to them.
pub struct CorrelationBroker {
    publisher: Arc<dyn EventPublisher>,
    source: String,
    pending: DashMap<CorrelationId, PendingReply>,
    default_timeout: Duration,
    stats: Arc<CorrelationStats>,
}

impl CorrelationBroker {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        source: impl Into<String>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            publisher,
            source: source.into(),
            pending: DashMap::new(),
            default_timeout,
            stats: Arc::new(CorrelationStats::default()),
        }
    }

    /// Publish `event` to `exchange` and wait for the correlated reply.
    ///
    /// `correlation_id` reuses an existing id (for example the id of the
    /// request being served); `None` generates a fresh one. `timeout`
    /// defaults to the broker's default timeout.
    pub async fn request(
        &self,
        exchange: &str,
        event: Event,
        correlation_id: Option<CorrelationId>,
        timeout: Option<Duration>,
    ) -> Result<EventEnvelope, CorrelationError> {
        let correlation_id = correlation_id.unwrap_or_default();
        let timeout = timeout.unwrap_or(self.default_timeout);
        let request_type = event.event_type();
        let envelope = EventEnvelope::new(self.source.clone(), correlation_id.clone(), event);

        let (tx, mut rx) = oneshot::channel();
        match self.pending.entry(correlation_id.clone()) {
            Entry::Occupied(_) => return Err(CorrelationError::Duplicate(correlation_id)),
            Entry::Vacant(slot) => {
                slot.insert(PendingReply {
                    sender: tx,
                    created_at: Instant::now(),
                    request_type,
                });
            }
        }
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
        self.update_gauge();

        debug!(
            correlation_id = %correlation_id,
            request = %request_type,
            timeout_ms = timeout.as_millis() as u64,
            "Awaiting correlated reply"
        );

        if let Err(e) = self.publisher.emit(exchange, &envelope).await {
            self.pending.remove(&correlation_id);
            self.update_gauge();
            return Err(e.into());
        }

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(CorrelationError::Cancelled(correlation_id)),
            Err(_) => {
                if self.pending.remove(&correlation_id).is_none() {
                    // resolve() won the race and has already sent the reply
                    if let Ok(reply) = rx.try_recv() {
                        return Ok(reply);
                    }
                }
                self.update_gauge();
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                CORRELATION_TIMEOUTS.inc();
                warn!(
                    correlation_id = %correlation_id,
                    request = %request_type,
                    timeout_ms = timeout.as_millis() as u64,
                    "Correlated request timed out"
                );
                Err(CorrelationError::Timeout {
                    correlation_id,
                    waited_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Deliver a reply to the waiting caller.
    ///
    /// Returns `false` when no request with the envelope's id is pending.
    pub fn resolve(&self, reply: EventEnvelope) -> bool {
        let Some((correlation_id, pending)) = self.pending.remove(&reply.correlation_id) else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %reply.correlation_id,
                reply = %reply.event_type(),
                "Reply for unknown correlation id dropped"
            );
            return false;
        };
        self.update_gauge();

        let elapsed = pending.created_at.elapsed();
        let reply_type = reply.event_type();
        if pending.sender.send(reply).is_err() {
            // Receiver dropped: the caller gave up
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.stats.total_resolved.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %correlation_id,
            request = %pending.request_type,
            reply = %reply_type,
            elapsed_ms = elapsed.as_millis() as u64,
            "Correlated reply resolved"
        );
        true
    }

    /// Drop a pending request; its caller receives `Cancelled`.
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        let removed = self.pending.remove(correlation_id).is_some();
        self.update_gauge();
        removed
    }

    #[must_use]
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    #[must_use]
    pub fn stats(&self) -> Arc<CorrelationStats> {
        Arc::clone(&self.stats)
    }

    fn update_gauge(&self) {
        CORRELATION_PENDING.set(self.pending.len() as f64);
    }
}
