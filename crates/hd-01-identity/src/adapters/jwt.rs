//! HS256 access tokens.

use crate::error::{IdentityError, IdentityResult};
use crate::ports::TokenIssuer;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared_types::Role;
use uuid::Uuid;

/// Default access token lifetime in minutes.
pub const DEFAULT_EXPIRY_MINS: i64 = 60;

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    pub role: Role,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier for revocation and audit.
    pub jti: String,
}

/// Signing configuration.
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiry_mins: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("expiry_mins", &self.expiry_mins)
            .finish()
    }
}

/// Issues and validates HS256 tokens.
#[derive(Debug, Clone)]
pub struct JwtIssuer {
    config: JwtConfig,
}

impl JwtIssuer {
    #[must_use]
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    /// Validate signature and expiry, returning the claims.
    pub fn validate(&self, token: &str) -> IdentityResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| IdentityError::InvalidCredentials)
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, user_id: &str, role: Role) -> IdentityResult<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: now + self.config.expiry_mins * 60,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(), // HS256
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|e| IdentityError::Token {
            reason: e.to_string(),
        })
    }
}
