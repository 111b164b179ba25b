use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

use crate::config::SecurityConfig;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Stored credential hash is malformed")]
    MalformedHash,
    #[error("Hashing task failed: {0}")]
    Task(String),
}

/// Argon2id credential hasher with configurable cost.
///
/// The async methods run on the blocking pool. Lookups that find no account
/// verify against `decoy_hash` so they cost the same as a wrong password.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    decoy_hash: Arc<str>,
}

impl CredentialHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);
        let decoy_hash = argon2
            .hash_password(b"decoy-credential", &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
            .to_string();
        Ok(Self {
            argon2,
            decoy_hash: decoy_hash.into(),
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, PasswordError> {
        Self::new(security.password_memory_kib, security.password_iterations)
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    /// Returns `Ok(false)` on mismatch; only a corrupt stored hash is an error.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(stored_hash).map_err(|_| PasswordError::MalformedHash)?;
        Ok(self.argon2.verify_password(password.as_bytes(), &parsed).is_ok())
    }

    pub async fn hash_async(&self, password: &str) -> Result<String, PasswordError> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
    }

    /// `None` means no such account: one decoy verification, always `false`.
    pub async fn verify_async(&self, password: &str, stored_hash: Option<&str>) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        let password = password.to_string();
        let stored_hash = stored_hash.map(str::to_string);
        tokio::task::spawn_blocking(move || match stored_hash {
            Some(hash) => hasher.verify(&password, &hash),
            None => hasher.verify(&password, &hasher.decoy_hash).map(|_| false),
        })
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher").finish_non_exhaustive()
    }
}

pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH));
    }
    Ok(())
}
