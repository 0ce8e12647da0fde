//! Adapters for the identity service's outbound ports.

pub mod jwt;
pub mod memory;
pub mod password;

pub use jwt::{Claims, JwtConfig, JwtIssuer};
pub use memory::MemoryUserStore;
pub use password::Argon2Hasher;
