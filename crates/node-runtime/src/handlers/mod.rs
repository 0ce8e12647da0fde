//! Boundary handlers hosted by the runtime.

pub mod push;

pub use push::{PushGateway, PushMessage, SessionId, SessionRegistry};
