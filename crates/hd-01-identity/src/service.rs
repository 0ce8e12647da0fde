//! Identity Service - Core business logic

use crate::domain::{Credentials, Registration, User};
use crate::error::{IdentityError, IdentityResult};
use crate::ipc::SERVICE_NAME;
use crate::ports::{AuthOutcome, CredentialHasher, IdentityApi, TokenIssuer, UserStore};
use async_trait::async_trait;
use herald_telemetry::{log_event, IDENTITY_ATTEMPTS};
use shared_types::UserSummary;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Password verified against when the email is unknown, so that both
/// rejection paths cost one hash verification.
const TIMING_PLACEHOLDER: &str = "herald-timing-placeholder";

/// Identity service over a user store, a hasher and a token issuer.
pub struct IdentityService {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenIssuer>,
    dummy_hash: OnceCell<String>,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            dummy_hash: OnceCell::new(),
        }
    }

    async fn dummy_hash(&self) -> IdentityResult<&str> {
        self.dummy_hash
            .get_or_try_init(|| self.hasher.hash(TIMING_PLACEHOLDER))
            .await
            .map(String::as_str)
    }

    fn outcome(&self, user: &User) -> IdentityResult<AuthOutcome> {
        Ok(AuthOutcome {
            access_token: self.tokens.issue(&user.id, user.role)?,
            user: user.summary(),
        })
    }

    async fn create_account(&self, registration: Registration) -> IdentityResult<AuthOutcome> {
        if self
            .store
            .find_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(IdentityError::EmailInUse);
        }

        let password_hash = self.hasher.hash(&registration.password).await?;
        let user = self
            .store
            .insert(User::new(registration.name, registration.email, password_hash))
            .await?;

        log_event!(info, SERVICE_NAME, "User registered", user_id = %user.id);
        self.outcome(&user)
    }

    async fn authenticate(&self, credentials: &Credentials) -> IdentityResult<User> {
        let Some(user) = self.store.find_by_email(&credentials.email).await? else {
            let dummy = self.dummy_hash().await?;
            let _ = self.hasher.verify(&credentials.password, dummy).await?;
            return Err(IdentityError::InvalidCredentials);
        };

        let matches = self
            .hasher
            .verify(&credentials.password, &user.password_hash)
            .await?;
        if !matches || !user.is_active {
            return Err(IdentityError::InvalidCredentials);
        }
        Ok(user)
    }
}

fn record(operation: &str, result: &IdentityResult<AuthOutcome>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.code().as_str(),
    };
    IDENTITY_ATTEMPTS
        .with_label_values(&[operation, outcome])
        .inc();
}

#[async_trait]
impl IdentityApi for IdentityService {
    async fn register(&self, registration: Registration) -> IdentityResult<AuthOutcome> {
        let result = self.create_account(registration).await;
        record("register", &result);
        result
    }

    async fn login(&self, credentials: Credentials) -> IdentityResult<AuthOutcome> {
        let result = match self.authenticate(&credentials).await {
            Ok(user) => {
                debug!(user_id = %user.id, "Login succeeded");
                self.outcome(&user)
            }
            Err(e) => Err(e),
        };

        record("login", &result);
        result
    }

    async fn list_active_users(&self) -> IdentityResult<Vec<UserSummary>> {
        let users = self.store.list_active().await?;
        debug!(count = users.len(), "Listed active users");
        Ok(users.iter().map(User::summary).collect())
    }
}
