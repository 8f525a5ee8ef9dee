//! Argon2id implementation of [`PasswordService`].
//!
//! Hashing is CPU-bound, so both operations run on the blocking pool.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use domains::{DomainError, PasswordService};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Argon2Passwords {
    params: Params,
}

impl Default for Argon2Passwords {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2Passwords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom cost parameters. Existing digests keep verifying since each
    /// digest records the parameters it was made with.
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    /// Minimum-cost hashing for tests and local seeding.
    pub fn cheap() -> Self {
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None)
            .unwrap_or_default();
        Self::with_params(params)
    }
}

#[async_trait]
impl PasswordService for Argon2Passwords {
    async fn hash_password(&self, password: &str) -> Result<String, DomainError> {
        let password = password.to_owned();
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| DomainError::Internal(format!("password hashing failed: {e}")))
        })
        .await
        .map_err(|e| DomainError::Internal(format!("hashing task failed: {e}")))?
    }

    async fn check_password(&self, password: &str, digest: &str) -> bool {
        let password = password.to_owned();
        let digest = digest.to_owned();
        let outcome = tokio::task::spawn_blocking(move || {
            let parsed = match PasswordHash::new(&digest) {
                Ok(parsed) => parsed,
                Err(_) => return false,
            };
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .await;

        outcome.unwrap_or_else(|e| {
            warn!(error = %e, "password check task failed");
            false
        })
    }
}
