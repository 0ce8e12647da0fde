//! IPC layer for the notification service.

pub mod handler;

pub use handler::{NotificationEventHandler, SERVICE_NAME};
