/// JWT Claims structure
///
/// Represents the payload of access and refresh tokens. Tokens are signed,
/// not encrypted: only the user id, role and tenant are ever embedded.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Role;
use crate::error::AppError;

/// JWT Claims for access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (numeric user ID as a string, per RFC 7519)
    pub sub: String,
    pub role: Role,
    /// Tenant the token acts for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<i64>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Unique token ID; two tokens minted in the same second still differ
    pub jti: String,
}

impl Claims {
    /// Create new claims with user information
    ///
    /// # Arguments
    /// * `user_id` - User's numeric ID
    /// * `role` - User's role
    /// * `store_id` - Effective tenant, if any
    /// * `expiry_seconds` - Token expiration in seconds from now
    /// * `issuer` - Issuer identifier
    pub fn new(
        user_id: i64,
        role: Role,
        store_id: Option<i64>,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            role,
            store_id,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns an unauthorized error if the subject is not a numeric ID
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::unauthorized("Invalid subject in token"))
    }

    /// Expiry as a timestamp, for persisting alongside the token
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}
