//! Driven Ports (SPI - Outbound Dependencies)

use crate::domain::User;
use crate::error::IdentityResult;
use async_trait::async_trait;
use shared_types::Role;

/// Persistent user storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact, case-sensitive email lookup.
    async fn find_by_email(&self, email: &str) -> IdentityResult<Option<User>>;

    /// Insert a user. Fails with `EmailInUse` if the email is taken; the
    /// check and insert are atomic.
    async fn insert(&self, user: User) -> IdentityResult<User>;

    async fn list_active(&self) -> IdentityResult<Vec<User>>;
}

/// One-way password hashing.
#[async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash(&self, password: &str) -> IdentityResult<String>;

    /// `Ok(false)` on mismatch; `Err` only for an unusable hash.
    async fn verify(&self, password: &str, hash: &str) -> IdentityResult<bool>;
}

/// Access-token issuance.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user_id: &str, role: Role) -> IdentityResult<String>;
}
