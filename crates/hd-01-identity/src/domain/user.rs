//! User entity and registration input validation.

use crate::error::{IdentityError, IdentityResult};
use chrono::{DateTime, Utc};
use shared_types::{LoginRequest, RegisterRequest, Role, UserSummary};
use uuid::Uuid;

/// A stored user account.
///
/// `password_hash` is a PHC string and never leaves the service.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A new active account with the default role.
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            password_hash,
            role: Role::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public projection without credentials.
    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Validated registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl TryFrom<RegisterRequest> for Registration {
    type Error = IdentityError;

    fn try_from(request: RegisterRequest) -> IdentityResult<Self> {
        let name = present(request.name);
        let email = present(request.email);
        let password = request.password.filter(|p| !p.is_empty());

        match (name, email, password) {
            (Some(name), Some(email), Some(password)) => Ok(Self {
                name,
                email,
                password,
            }),
            _ => Err(IdentityError::MissingFields {
                fields: vec!["name", "email", "password"],
            }),
        }
    }
}

/// Validated login input.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl TryFrom<LoginRequest> for Credentials {
    type Error = IdentityError;

    fn try_from(request: LoginRequest) -> IdentityResult<Self> {
        match (present(request.email), request.password.filter(|p| !p.is_empty())) {
            (Some(email), Some(password)) => Ok(Self { email, password }),
            _ => Err(IdentityError::MissingFields {
                fields: vec!["email", "password"],
            }),
        }
    }
}

/// Trimmed, non-empty text. Emails keep their case: matching is exact.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
