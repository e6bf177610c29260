/// Password Hashing and Verification
///
/// Handles one-way salted password hashing with bcrypt. Strength rules live
/// in `validators`; this module only refuses empty input.

use actix_web::web;

use crate::error::AppError;

pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// bcrypt with a fixed, configured cost. Every call draws a fresh salt.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password using bcrypt
    ///
    /// # Errors
    /// Returns error if:
    /// - Password is empty
    /// - Bcrypt hashing fails (e.g. cost out of range)
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.is_empty() {
            return Err(AppError::validation("Password must not be empty"));
        }

        bcrypt::hash(password, self.cost)
            .map_err(|e| AppError::internal("Password hashing failed").with_source(e))
    }

    /// Verify a password against its hash
    ///
    /// A malformed digest is a mismatch, never an error.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match bcrypt::verify(password, hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                false
            }
        }
    }

    /// `hash` on the blocking thread pool
    pub async fn hash_blocking(&self, password: String) -> Result<String, AppError> {
        let hasher = *self;
        web::block(move || hasher.hash(&password)).await?
    }

    /// `verify` on the blocking thread pool
    pub async fn verify_blocking(&self, password: String, hash: String) -> Result<bool, AppError> {
        let hasher = *self;
        Ok(web::block(move || hasher.verify(&password, &hash)).await?)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}
