//! Driving Ports (API - Inbound)

use crate::domain::{Credentials, Registration};
use crate::error::IdentityResult;
use async_trait::async_trait;
use shared_types::{Role, UserSummary};

/// Successful registration or login.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: UserSummary,
    pub access_token: String,
}

impl AuthOutcome {
    #[must_use]
    pub fn role(&self) -> Role {
        self.user.role
    }
}

/// Primary identity API
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Create an account and issue its first access token.
    async fn register(&self, registration: Registration) -> IdentityResult<AuthOutcome>;

    /// Verify credentials and issue an access token.
    ///
    /// Every rejection is [`IdentityError::InvalidCredentials`](crate::IdentityError::InvalidCredentials).
    async fn login(&self, credentials: Credentials) -> IdentityResult<AuthOutcome>;

    /// Users with `is_active = true`.
    async fn list_active_users(&self) -> IdentityResult<Vec<UserSummary>>;
}
