//! IPC layer: the identity service's bus adapter.

pub mod handler;

pub use handler::{IdentityEventHandler, SERVICE_NAME};
