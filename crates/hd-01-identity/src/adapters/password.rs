//! Argon2id password hashing.
//!
//! Hashes are PHC strings with a random salt from [`OsRng`], so the algorithm
//! parameters travel with the hash. Hashing runs on the blocking pool.

use crate::error::{IdentityError, IdentityResult};
use crate::ports::CredentialHasher;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;

/// Argon2id with default parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

fn hashing_error(reason: impl ToString) -> IdentityError {
    IdentityError::Hashing {
        reason: reason.to_string(),
    }
}

#[async_trait]
impl CredentialHasher for Argon2Hasher {
    async fn hash(&self, password: &str) -> IdentityResult<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(hashing_error)?
            .map_err(hashing_error)
    }

    async fn verify(&self, password: &str, hash: &str) -> IdentityResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(hashing_error)?
            .map_err(hashing_error)
    }
}
