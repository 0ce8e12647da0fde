//! # Service Container
//!
//! Central container holding the broker and every service instance with
//! its adapters.

pub mod config;
pub mod services;

pub use config::{BusConfig, ConfigError, IdentityConfig, NodeConfig};
pub use services::ServiceContainer;
