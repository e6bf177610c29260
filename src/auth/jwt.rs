/// JWT Token Issuance and Verification
///
/// Access and refresh tokens are signed with distinct secrets, so leaking
/// one secret never lets an attacker mint the other class of token.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::domain::Role;

/// Why a token was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    InvalidSignature,
    Malformed(String),
    Signing(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::InvalidSignature => write!(f, "token signature does not match"),
            TokenError::Malformed(msg) => write!(f, "malformed token: {}", msg),
            TokenError::Signing(msg) => write!(f, "token signing failed: {}", msg),
        }
    }
}

impl StdError for TokenError {}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            JwtErrorKind::ExpiredSignature => TokenError::Expired,
            JwtErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// A freshly signed token together with the claims it carries
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub claims: Claims,
}

/// Creates and verifies signed, time-limited tokens
#[derive(Clone)]
pub struct TokenIssuer {
    config: JwtSettings,
}

impl TokenIssuer {
    pub fn new(config: JwtSettings) -> Self {
        Self { config }
    }

    pub fn settings(&self) -> &JwtSettings {
        &self.config
    }

    /// Access token lifetime in seconds
    pub fn access_token_expiry(&self) -> i64 {
        self.config.access_token_expiry
    }

    /// Generate a short-lived access token
    ///
    /// # Errors
    /// Returns error if token signing fails
    pub fn issue_access(
        &self,
        user_id: i64,
        role: Role,
        store_id: Option<i64>,
    ) -> Result<SignedToken, TokenError> {
        let claims = Claims::new(
            user_id,
            role,
            store_id,
            self.config.access_token_expiry,
            self.config.issuer.clone(),
        );
        let token = self.sign(&claims, self.config.access_secret.as_bytes())?;
        Ok(SignedToken { token, claims })
    }

    /// Generate a long-lived refresh token, signed with the refresh secret
    pub fn issue_refresh(
        &self,
        user_id: i64,
        role: Role,
        store_id: Option<i64>,
    ) -> Result<SignedToken, TokenError> {
        let claims = Claims::new(
            user_id,
            role,
            store_id,
            self.config.refresh_token_expiry,
            self.config.issuer.clone(),
        );
        let token = self.sign(&claims, self.config.refresh_secret.as_bytes())?;
        Ok(SignedToken { token, claims })
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, self.config.access_secret.as_bytes())
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, self.config.refresh_secret.as_bytes())
    }

    /// Validate a token against `secret` and extract its claims
    ///
    /// # Errors
    /// `Expired` past expiry, `InvalidSignature` on a signature mismatch,
    /// `Malformed` for anything else (bad encoding, wrong issuer, ...)
    pub fn verify<T: DeserializeOwned>(&self, token: &str, secret: &[u8]) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Verify issuer matches configuration
        validation.set_issuer(&[&self.config.issuer]);
        // Expired means expired: no clock tolerance past `exp`
        validation.leeway = 0;

        decode::<T>(token, &DecodingKey::from_secret(secret), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT validation error");
                TokenError::from(e)
            })
    }

    /// Sign arbitrary claims with `secret` (HS256)
    pub fn sign<T: Serialize>(&self, claims: &T, secret: &[u8]) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret))
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}
