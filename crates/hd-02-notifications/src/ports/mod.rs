//! Ports layer (hexagonal architecture)

pub mod inbound;
pub mod outbound;

pub use inbound::{InboxPage, NotificationApi, Page, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use outbound::{DirectoryError, NotificationStore, RecipientDirectory};
