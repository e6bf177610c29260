/// Authentication service
///
/// Stateless orchestrator over the pool: every call reads and writes the
/// database, hashes on the blocking pool and signs tokens. Inputs reach
/// here already validated by `validators`.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::password::PasswordHasher;
use crate::auth::{refresh_token, reset_token, TokenIssuer};
use crate::domain::{PublicUser, Role, User};
use crate::error::{AppError, ErrorContext};
use crate::users::repository::{self, NewUser};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub store_name: Option<String>,
    pub phone: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email, phone or username
    #[serde(alias = "email")]
    pub identifier: String,
    pub password: String,
    pub store_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

/// Token pair handed out on login and registration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: PublicUser,
    pub token: TokenPair,
}

/// Result of a refresh: a new access token only
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub access_token: String,
    pub expires_in: i64,
}

const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

/// Pick the tenant a login acts for.
///
/// An explicit request must name the owning store or a membership. Without
/// one, the oldest membership wins, then the owning store.
pub fn resolve_tenant(
    user: &User,
    memberships: &[i64],
    requested: Option<i64>,
) -> Result<i64, AppError> {
    match requested {
        Some(store_id) if store_id == user.store_id || memberships.contains(&store_id) => {
            Ok(store_id)
        }
        Some(_) => Err(AppError::forbidden("You do not have access to this store")),
        None => Ok(memberships.first().copied().unwrap_or(user.store_id)),
    }
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    tokens: TokenIssuer,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(pool: PgPool, tokens: TokenIssuer, hasher: PasswordHasher) -> Self {
        Self {
            pool,
            tokens,
            hasher,
        }
    }

    /// Create a store and its first admin, then open a session for them.
    ///
    /// Store, user and refresh token are written in one transaction; a
    /// duplicate email, phone or username aborts all three with `Conflict`.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, AppError> {
        let context = ErrorContext::new("user_registration");
        let password_hash = self.hasher.hash_blocking(request.password).await?;
        let store_name = request
            .store_name
            .unwrap_or_else(|| format!("{}'s store", request.name));

        let mut tx = self.pool.begin().await?;
        let store = repository::insert_store(&mut *tx, &store_name).await?;
        let user = repository::insert_user(
            &mut *tx,
            &NewUser {
                name: request.name,
                email: request.email,
                phone: request.phone,
                username: request.username,
                password_hash,
                role: Role::Admin,
                store_id: store.id,
                is_active: true,
            },
        )
        .await?;
        let token = self.issue_pair(&mut tx, &user, store.id).await?;
        tx.commit().await?;

        tracing::info!(
            operation_id = %context.operation_id,
            user_id = user.id,
            store_id = store.id,
            "User registered with a new store"
        );

        Ok(AuthSession {
            user: user.into(),
            token,
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AppError> {
        let context = ErrorContext::new("user_login");

        let user = repository::find_by_identifier(&self.pool, &request.identifier)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        let context = context.with_user_id(user.id);

        if !user.is_active {
            let err = AppError::forbidden("Account is deactivated");
            context.log_error(&err);
            return Err(err);
        }

        let valid = self
            .hasher
            .verify_blocking(request.password, user.password_hash.clone())
            .await?;
        if !valid {
            let err = AppError::unauthorized("Invalid credentials");
            context.log_error(&err);
            return Err(err);
        }

        let memberships = repository::membership_store_ids(&self.pool, user.id).await?;
        let store_id = resolve_tenant(&user, &memberships, request.store_id)?;

        let mut conn = self.pool.acquire().await?;
        let token = self.issue_pair(&mut conn, &user, store_id).await?;

        tracing::info!(
            operation_id = %context.operation_id,
            user_id = user.id,
            store_id = store_id,
            "User logged in"
        );

        Ok(AuthSession {
            user: user.into(),
            token,
        })
    }

    /// Exchange a live refresh token for a new access token.
    ///
    /// The refresh token itself is not rotated.
    pub async fn refresh(&self, token: &str) -> Result<AccessGrant, AppError> {
        let claims = self.tokens.verify_refresh(token)?;
        let user_id = claims.user_id()?;

        let record = refresh_token::find_refresh_token(&self.pool, user_id, token)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;
        if record.is_expired() {
            refresh_token::delete_refresh_token_by_id(&self.pool, record.id).await?;
            return Err(AppError::unauthorized("Refresh token has expired"));
        }

        let user = repository::find_by_id(&self.pool, user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| AppError::unauthorized("User no longer exists or is inactive"))?;

        let access = self
            .tokens
            .issue_access(user.id, user.role, claims.store_id)?;

        tracing::debug!(user_id = user.id, "Access token refreshed");

        Ok(AccessGrant {
            access_token: access.token,
            expires_in: self.tokens.access_token_expiry(),
        })
    }

    /// Revoke one refresh token of `user_id`. Revoking twice is not an error.
    pub async fn logout(&self, user_id: i64, token: &str) -> Result<(), AppError> {
        let revoked = refresh_token::revoke_refresh_token(&self.pool, user_id, token).await?;
        tracing::info!(user_id = user_id, revoked = revoked, "User logged out");
        Ok(())
    }

    /// Create a reset token when `email` belongs to a user.
    ///
    /// Succeeds the same way whether or not the account exists.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let context = ErrorContext::new("forgot_password");

        let Some(user) = repository::find_by_email(&self.pool, email).await? else {
            tracing::info!(
                operation_id = %context.operation_id,
                "Password reset requested for unknown email"
            );
            return Ok(());
        };

        let (token, expires_at) =
            reset_token::issue_reset_token(&self.tokens, user.id, &user.password_hash)?;
        reset_token::save_reset_token(&self.pool, user.id, &token, expires_at).await?;

        // Delivery is out of band; the token never reaches the logs
        tracing::info!(
            operation_id = %context.operation_id,
            user_id = user.id,
            expires_at = %expires_at,
            "Password reset token issued"
        );
        Ok(())
    }

    /// Set a new password from a reset token and end every session.
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AppError> {
        if request.password != request.password_confirm {
            return Err(AppError::validation("Passwords do not match"));
        }

        let mut tx = self.pool.begin().await?;

        let record = reset_token::find_usable_reset_token(&mut *tx, &request.token)
            .await?
            .ok_or_else(|| AppError::validation(INVALID_RESET_TOKEN))?;
        let user = repository::find_by_id(&mut *tx, record.user_id)
            .await?
            .ok_or_else(|| AppError::validation(INVALID_RESET_TOKEN))?;

        let claims = reset_token::verify_reset_token(&self.tokens, &request.token, &user.password_hash)
            .map_err(|_| AppError::validation(INVALID_RESET_TOKEN))?;
        if claims.sub != user.id.to_string() {
            return Err(AppError::validation(INVALID_RESET_TOKEN));
        }

        let password_hash = self.hasher.hash_blocking(request.password).await?;
        repository::update_password(&mut *tx, user.id, &password_hash).await?;
        if !reset_token::mark_reset_token_used(&mut *tx, record.id).await? {
            return Err(AppError::validation(INVALID_RESET_TOKEN));
        }
        refresh_token::revoke_all_user_tokens(&mut *tx, user.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = user.id, "Password reset completed");
        Ok(())
    }

    async fn issue_pair(
        &self,
        conn: &mut sqlx::PgConnection,
        user: &User,
        store_id: i64,
    ) -> Result<TokenPair, AppError> {
        let access = self.tokens.issue_access(user.id, user.role, Some(store_id))?;
        let refresh = self.tokens.issue_refresh(user.id, user.role, Some(store_id))?;

        refresh_token::save_refresh_token(
            conn,
            user.id,
            &refresh.token,
            refresh.claims.expires_at(),
        )
        .await?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer",
            expires_in: self.tokens.access_token_expiry(),
        })
    }
}
