//! # Envelope Codec
//!
//! JSON wire format for [`EventEnvelope`]:
//!
//! ```text
//! {
//!   "eventType":     "notification.create.requested",
//!   "correlationId": "0190b6c2-...",
//!   "timestamp":     "2024-07-01T12:00:00.000Z",
//!   "source":        "gateway",
//!   "payload":       { ... },
//!   "metadata":      { ... }            (optional)
//! }
//! ```
//!
//! Decoding is two-phase: the header is parsed loosely so that missing
//! fields produce a precise [`DecodeError`], then the payload is decoded into
//! the concrete shape selected by `eventType`.

use crate::envelope::{CorrelationId, EventEnvelope};
use crate::errors::{DecodeError, EncodeError};
use crate::ipc::{Event, EventType};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source recorded when an inbound envelope omits one.
pub const UNKNOWN_SOURCE: &str = "unknown";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOut<'a> {
    event_type: &'static str,
    correlation_id: &'a str,
    timestamp: String,
    source: &'a str,
    payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIn {
    event_type: Option<String>,
    correlation_id: Option<String>,
    timestamp: Option<String>,
    source: Option<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

/// Serialize an envelope to its JSON wire form.
pub fn encode(envelope: &EventEnvelope) -> Result<Vec<u8>, EncodeError> {
    let (event_type, payload) = envelope.event.to_parts()?;
    let wire = WireOut {
        event_type: event_type.routing_key(),
        correlation_id: envelope.correlation_id.as_str(),
        timestamp: envelope
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        source: &envelope.source,
        payload,
        metadata: envelope.metadata.as_ref(),
    };
    Ok(serde_json::to_vec(&wire)?)
}

/// Parse an envelope from its JSON wire form.
pub fn decode(bytes: &[u8]) -> Result<EventEnvelope, DecodeError> {
    let wire: WireIn = serde_json::from_slice(bytes).map_err(DecodeError::Malformed)?;

    let event_type = non_empty(wire.event_type).ok_or(DecodeError::MissingField("eventType"))?;
    let correlation_id =
        non_empty(wire.correlation_id).ok_or(DecodeError::MissingField("correlationId"))?;

    let event_type: EventType = event_type
        .parse()
        .map_err(|_| DecodeError::UnknownEventType(event_type.clone()))?;

    let timestamp = match wire.timestamp {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| DecodeError::InvalidTimestamp(raw))?,
        None => Utc::now(),
    };

    let payload = match wire.payload {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    let event =
        Event::from_parts(event_type, payload).map_err(|source| DecodeError::InvalidPayload {
            event_type: event_type.routing_key(),
            source,
        })?;

    Ok(EventEnvelope {
        correlation_id: CorrelationId::from(correlation_id),
        timestamp,
        source: wire.source.unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
        event,
        metadata: wire.metadata,
    })
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}
