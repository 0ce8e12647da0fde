//! # Shared Types Crate
//!
//! This crate contains the wire contract every Herald service speaks: the
//! `EventEnvelope`, the closed `Event` union keyed by routing key, the payload
//! shapes, and the failure taxonomy.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-service types are defined here.
//! - **Closed Event Set**: Every `eventType` on the wire maps to exactly one
//!   `Event` variant. Unknown tags are rejected by the codec, never ignored.
//! - **Correlation Echo**: Replies are built with [`EventEnvelope::reply`], which
//!   carries the request's `correlationId` unchanged.

pub mod codec;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod ipc;

pub use codec::{decode, encode};
pub use entities::*;
pub use envelope::{CorrelationId, EventEnvelope};
pub use errors::*;
pub use ipc::*;
