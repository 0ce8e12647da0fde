//! # hd-02-notifications
//!
//! Notification lifecycle engine: creates notifications for explicit or
//! broadcast audiences and tracks every recipient through
//! `created → delivered → read → acknowledged`.
//!
//! ## Architecture
//!
//! ```text
//! Gateway ──notification.*.requested──→ Notifications (2) ──notification.* outcome──→ Gateway
//!                                              │    ▲
//!                     user.list.requested ─────┘    └───── user.list.succeeded|failed
//!                                              ▼    │
//!                                          Identity (1)
//! Push edge ──notification.delivered──→ Notifications (2)
//! ```
//!
//! ## Invariants
//!
//! - A notification and its recipient rows are stored together or not at all
//! - Exactly one row per (notification, user)
//! - Status never moves backwards; every move is a guarded, atomic update
//! - Only top-tier (`high`) notifications can be acknowledged
//! - Repeating mark-read or acknowledge reports the original timestamps
//!
//! ## Example
//!
//! ```rust,ignore
//! use hd_02_notifications::adapters::{BusRecipientDirectory, MemoryNotificationStore};
//! use hd_02_notifications::{NotificationEventHandler, NotificationService};
//!
//! let directory = BusRecipientDirectory::new(correlation.clone(), "herald.events", timeout);
//! let service = NotificationService::new(Arc::new(MemoryNotificationStore::new()), Arc::new(directory));
//! let handler = NotificationEventHandler::new(Arc::new(service), correlation, publisher, "herald.events");
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ipc;
pub mod ports;
pub mod service;

pub use domain::{Audience, Draft, Notification, Recipient, RecipientFilter, Transition};
pub use error::{NotificationError, NotificationResult, StoreError};
pub use ipc::{NotificationEventHandler, SERVICE_NAME};
pub use ports::{InboxPage, NotificationApi, Page};
pub use service::NotificationService;
