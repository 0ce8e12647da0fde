//! # hd-01-identity
//!
//! Identity service: account registration, login and the active-user
//! listing used to resolve broadcast notifications.
//!
//! ## Architecture
//!
//! ```text
//! Gateway ──user.auth.register.requested──→ Identity (1) ──user.auth.register.succeeded|failed──→
//! Gateway ──user.auth.login.requested─────→ Identity (1) ──user.auth.login.succeeded|failed─────→
//! Notifications (2) ──user.list.requested─→ Identity (1) ──user.list.succeeded|failed───────────→
//! ```
//!
//! ## Invariants
//!
//! - Emails are unique and matched exactly (case-sensitive)
//! - Passwords are stored only as Argon2id PHC strings and never published
//! - Every login rejection carries the same reason, `Invalid credentials`
//! - Only active users are listed
//!
//! ## Example
//!
//! ```rust,ignore
//! use hd_01_identity::adapters::{Argon2Hasher, JwtConfig, JwtIssuer, MemoryUserStore};
//! use hd_01_identity::{IdentityEventHandler, IdentityService};
//!
//! let service = IdentityService::new(
//!     Arc::new(MemoryUserStore::new()),
//!     Arc::new(Argon2Hasher::new()),
//!     Arc::new(JwtIssuer::new(jwt_config)),
//! );
//! let handler = IdentityEventHandler::new(Arc::new(service), publisher, "herald.events");
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

pub use domain::{Credentials, Registration, User};
pub use error::{IdentityError, IdentityResult};
pub use ipc::{IdentityEventHandler, SERVICE_NAME};
pub use ports::{AuthOutcome, IdentityApi};
pub use service::IdentityService;
