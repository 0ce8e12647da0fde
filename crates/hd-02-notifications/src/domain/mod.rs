//! Domain layer for the notification service.

pub mod notification;
pub mod recipient;

pub use notification::{dedupe, Audience, Draft, Notification};
pub use recipient::{Recipient, RecipientFilter, Transition};
