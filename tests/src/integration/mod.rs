//! Cross-service flows run against a fully wired [`NodeRuntime`].
//!
//! [`NodeRuntime`]: node_runtime::NodeRuntime

pub mod broadcast;
pub mod correlation;
pub mod dead_letter;
pub mod identity;
pub mod lifecycle;
