//! # `EventEnvelope`
//!
//! The universal wrapper for every message on the broker.
//!
//! ## Properties
//!
//! - **Correlation**: `correlation_id` is assigned once by the request's
//!   originator and echoed unchanged by every reply ([`EventEnvelope::reply`]).
//! - **Typed Payload**: the `event` field is the closed [`Event`] union, so a
//!   decoded envelope is always a known, well-formed event.
//! - **Diagnostics**: `source` and `timestamp` identify the emitter.

use crate::codec;
use crate::errors::{DecodeError, EncodeError};
use crate::ipc::{Event, EventType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier linking a request to its replies.
///
/// Locally generated ids are UUID v7 strings (time-ordered). Ids received
/// from the wire are treated as opaque and never re-parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new correlation ID (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A typed event plus its routing and diagnostic header.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Identical across a request and all of its replies.
    pub correlation_id: CorrelationId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Originating component name.
    pub source: String,
    /// The event; its tag is the wire `eventType`.
    pub event: Event,
    /// Free-form extension data, passed through untouched.
    pub metadata: Option<Map<String, Value>>,
}

impl EventEnvelope {
    /// Wrap an event for emission now.
    pub fn new(source: impl Into<String>, correlation_id: CorrelationId, event: Event) -> Self {
        Self {
            correlation_id,
            timestamp: Utc::now(),
            source: source.into(),
            event,
            metadata: None,
        }
    }

    /// Build a reply that echoes this envelope's correlation id.
    #[must_use]
    pub fn reply(&self, source: impl Into<String>, event: Event) -> Self {
        Self::new(source, self.correlation_id.clone(), event)
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }

    /// Routing key this envelope is published under.
    #[must_use]
    pub fn routing_key(&self) -> &'static str {
        self.event_type().routing_key()
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        codec::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        codec::decode(bytes)
    }
}
