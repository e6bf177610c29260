/// Password Reset Tokens
///
/// A reset token is a JWT signed with `access_secret + password_hash`, the
/// hash being the one current when the token is issued. Verification uses the
/// hash current at reset time, so once the password changes every reset token
/// issued before it stops verifying, whatever its expiry or `used` flag says.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

use crate::auth::jwt::{TokenError, TokenIssuer};
use crate::configuration::JwtSettings;
use crate::error::AppError;

/// Claims of a password reset token: the subject and nothing else
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
}

/// Unused, unexpired reset token row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResetTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

fn signing_key(config: &JwtSettings, password_hash: &str) -> Vec<u8> {
    let mut key = config.access_secret.as_bytes().to_vec();
    key.extend_from_slice(password_hash.as_bytes());
    key
}

/// Sign a reset token bound to the user's current password hash
///
/// Returns the token and its expiry.
pub fn issue_reset_token(
    issuer: &TokenIssuer,
    user_id: i64,
    password_hash: &str,
) -> Result<(String, DateTime<Utc>), TokenError> {
    let config = issuer.settings();
    let now = Utc::now();
    let expires_at = now + Duration::seconds(config.reset_token_expiry);
    let claims = ResetClaims {
        sub: user_id.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
        iss: config.issuer.clone(),
        jti: Uuid::new_v4().to_string(),
    };

    let token = issuer.sign(&claims, &signing_key(config, password_hash))?;
    Ok((token, expires_at))
}

/// Check the signature of a reset token against the user's current hash
pub fn verify_reset_token(
    issuer: &TokenIssuer,
    token: &str,
    password_hash: &str,
) -> Result<ResetClaims, TokenError> {
    issuer.verify::<ResetClaims>(token, &signing_key(issuer.settings(), password_hash))
}

pub async fn save_reset_token<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO password_reset_tokens (user_id, token, expires_at, used, created_at)
        VALUES ($1, $2, $3, FALSE, $4)
        "#,
    )
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}

/// Find an unexpired, unused row for `token` and lock it for the reset
pub async fn find_usable_reset_token<'e, E: PgExecutor<'e>>(
    executor: E,
    token: &str,
) -> Result<Option<ResetTokenRecord>, AppError> {
    let record = sqlx::query_as::<_, ResetTokenRecord>(
        r#"
        SELECT id, user_id, expires_at
        FROM password_reset_tokens
        WHERE token = $1 AND used = FALSE AND expires_at > $2
        FOR UPDATE
        "#,
    )
    .bind(token)
    .bind(Utc::now())
    .fetch_optional(executor)
    .await?;

    Ok(record)
}

/// Consume the token. Returns false if another request already used it.
pub async fn mark_reset_token_used<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE password_reset_tokens SET used = TRUE WHERE id = $1 AND used = FALSE",
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}
