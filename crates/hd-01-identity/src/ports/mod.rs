//! Ports layer (hexagonal architecture)

pub mod inbound;
pub mod outbound;

pub use inbound::{AuthOutcome, IdentityApi};
pub use outbound::{CredentialHasher, TokenIssuer, UserStore};
