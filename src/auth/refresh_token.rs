/// Refresh Token Persistence
///
/// Refresh tokens are signed JWTs, but a valid signature alone is not enough:
/// the token must also have a live row here. Deleting the row revokes the
/// token even though the JWT itself would still verify.
///
/// Only the SHA-256 digest of the token is stored (never the plaintext).

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgExecutor;

use crate::error::AppError;

/// Refresh token record from the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Hash a refresh token using SHA-256
///
/// Never store plaintext tokens in the database.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Save a refresh token to the database
///
/// # Arguments
/// * `executor` - Pool or open transaction
/// * `user_id` - User ID that owns this token
/// * `token` - Plaintext refresh token
/// * `expires_at` - Expiry decoded from the token's own `exp` claim
///
/// # Errors
/// Returns error if database operation fails
pub async fn save_refresh_token<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, token_hash, expires_at, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(hash_token(token))
    .bind(expires_at)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}

/// Look up the stored record for `token` owned by `user_id`
///
/// Expired records are returned too; the caller decides what to do with them.
pub async fn find_refresh_token<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
    token: &str,
) -> Result<Option<RefreshTokenRecord>, AppError> {
    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        r#"
        SELECT id, user_id, expires_at
        FROM refresh_tokens
        WHERE token_hash = $1 AND user_id = $2
        "#,
    )
    .bind(hash_token(token))
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(record)
}

pub async fn delete_refresh_token_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Revoke a single refresh token
///
/// Returns the number of rows removed; zero is not an error.
pub async fn revoke_refresh_token<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
    token: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND token_hash = $2")
        .bind(user_id)
        .bind(hash_token(token))
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Revoke all refresh tokens for a user
///
/// Used by password reset, password change and user deletion to end every
/// session the user has open.
pub async fn revoke_all_user_tokens<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;

    tracing::info!(
        user_id = user_id,
        revoked = result.rows_affected(),
        "All refresh tokens revoked for user"
    );
    Ok(result.rows_affected())
}
