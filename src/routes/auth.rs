/// Authentication Routes
///
/// Registration, login, token refresh, logout, password reset and the
/// current user. Bodies are validated here, then handed to `AuthService`.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::auth::service::{
    ForgotPasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
    ResetPasswordRequest,
};
use crate::auth::{AuthService, Identity};
use crate::error::AppError;
use crate::users::UserService;
use crate::validators::{
    validate_forgot_password, validate_login, validate_refresh, validate_register,
    validate_reset_password,
};

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for this email, a password reset link has been sent";

/// POST /auth/register
///
/// Creates a store and its first user, who becomes the store's admin.
///
/// # Errors
/// - 400: Validation errors
/// - 409: Email, phone or username already in use
pub async fn register(
    body: web::Json<RegisterRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let mut request = body.into_inner();
    validate_register(&mut request)?;

    let session = auth.register(request).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "status": "success",
        "message": "Registration successful",
        "user": session.user,
        "token": session.token,
    })))
}

/// POST /auth/login
///
/// # Errors
/// - 400: Validation errors
/// - 401: Wrong password
/// - 403: Account deactivated, or `storeId` not reachable by the user
/// - 404: No user with that email, phone or username
pub async fn login(
    body: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let mut request = body.into_inner();
    validate_login(&mut request)?;

    let session = auth.login(request).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "status": "success",
        "message": "Login successful",
        "user": session.user,
        "token": session.token,
    })))
}

/// POST /auth/refresh-token
///
/// Issues a new access token. The refresh token stays valid until it
/// expires or is revoked.
pub async fn refresh_token(
    body: web::Json<RefreshTokenRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    validate_refresh(&body)?;

    let grant = auth.refresh(&body.refresh_token).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "accessToken": grant.access_token,
        "expiresIn": grant.expires_in,
    })))
}

/// POST /auth/logout
pub async fn logout(
    identity: web::ReqData<Identity>,
    body: web::Json<RefreshTokenRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    validate_refresh(&body)?;

    auth.logout(identity.user_id, &body.refresh_token).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out successfully",
    })))
}

/// POST /auth/forgot-password
///
/// Answers identically whether or not the email is known.
pub async fn forgot_password(
    body: web::Json<ForgotPasswordRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let mut request = body.into_inner();
    validate_forgot_password(&mut request)?;

    auth.forgot_password(&request.email).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": FORGOT_PASSWORD_MESSAGE,
    })))
}

/// POST /auth/reset-password
pub async fn reset_password(
    body: web::Json<ResetPasswordRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    validate_reset_password(&request)?;

    auth.reset_password(request).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password has been reset, please log in again",
    })))
}

/// GET /auth/me
pub async fn me(
    identity: web::ReqData<Identity>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let user = users.profile(&identity).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": user,
    })))
}
