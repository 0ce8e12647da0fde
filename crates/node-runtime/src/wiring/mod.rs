//! # Service Wiring
//!
//! Broker topology connecting the services. Every service talks to the
//! others only through `herald.events`.

pub mod topology;

pub use topology::*;
