//! Domain layer for the identity service.

pub mod user;

pub use user::{Credentials, Registration, User};
