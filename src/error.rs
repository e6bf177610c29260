/// Unified error handling
///
/// Every failure in the application is an `AppError`: a kind, a
/// user-facing message, optional field-level validation detail and an
/// optional internal source. The kind alone decides the HTTP status.
///
/// Operational kinds (validation, auth, not-found, conflict) are expected
/// and shown to the caller as-is. Fault kinds (unavailable, internal) are
/// logged with their source and answered with a generic message.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::sync::OnceLock;

use crate::auth::TokenError;
use crate::configuration::Environment;

/// ============================================================================
/// 1. ERROR KINDS AND STATUS TABLE
/// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for client-side handling
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Unavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn is_operational(self) -> bool {
        !matches!(self, ErrorKind::Unavailable | ErrorKind::Internal)
    }
}

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub errors: Vec<FieldError>,
    pub source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Validation failure carrying every rejected field
    pub fn validation_fields(errors: Vec<FieldError>) -> Self {
        Self {
            errors,
            ..Self::validation("Validation failed")
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS (storage and token errors)
// ============================================================================

/// Postgres SQLSTATE codes translated into the operational taxonomy
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";

/// Map a unique index name to the field it protects.
fn field_for_constraint(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(name) if name.contains("email") => "email",
        Some(name) if name.contains("phone") => "phone",
        Some(name) if name.contains("username") => "username",
        Some(name) if name.contains("token") => "token",
        _ => "value",
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code().map(|code| code.into_owned());
            match code.as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    let field = field_for_constraint(db_err.constraint());
                    return AppError {
                        errors: vec![FieldError::new(field, format!("{} already exists", field))],
                        ..AppError::conflict(format!("The {} is already in use", field))
                    };
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    return AppError::validation("Invalid or unknown reference");
                }
                Some(STRING_DATA_RIGHT_TRUNCATION) => {
                    return AppError::validation("Value is too long");
                }
                _ => {}
            }
        }

        match err {
            sqlx::Error::RowNotFound => AppError::not_found("Record not found"),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::new(
                    ErrorKind::Unavailable,
                    "Database service temporarily unavailable",
                )
                .with_source(err)
            }
            _ => AppError::internal("Database error occurred").with_source(err),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::unauthorized("Token has expired"),
            TokenError::InvalidSignature | TokenError::Malformed(_) => {
                AppError::unauthorized("Invalid token")
            }
            TokenError::Signing(_) => AppError::internal("Token generation failed").with_source(err),
        }
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::internal("Background task failed").with_source(err)
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Record the deployment environment once at startup.
///
/// Outside production the envelope carries the internal error detail.
pub fn set_environment(environment: Environment) {
    let _ = ENVIRONMENT.set(environment);
}

fn exposes_detail() -> bool {
    !ENVIRONMENT.get().copied().unwrap_or_default().is_production()
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    /// `failed` for 4xx, `error` for 5xx
    pub status: &'static str,
    pub code: &'static str,
    pub message: String,
    /// Unique error ID for tracking
    pub error_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AppError {
    /// Build the uniform JSON envelope for this error.
    pub fn to_response_body(&self, error_id: &str, expose_detail: bool) -> ErrorResponse {
        let status = self.status();
        let message = if self.kind.is_operational() {
            self.message.clone()
        } else {
            match self.kind {
                ErrorKind::Unavailable => "Service temporarily unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        };

        let detail = if expose_detail {
            self.source
                .as_ref()
                .map(|source| format!("{}: {:?}", self.message, source))
        } else {
            None
        };

        ErrorResponse {
            success: false,
            status: if status.is_client_error() { "failed" } else { "error" },
            code: self.kind.code(),
            message,
            error_id: error_id.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            errors: self.errors.clone(),
            detail,
        }
    }

    pub fn log_error(&self, error_id: &str) {
        if self.kind.is_operational() {
            tracing::warn!(
                error_id = error_id,
                kind = ?self.kind,
                error = %self,
                "Request rejected"
            );
        } else {
            tracing::error!(
                error_id = error_id,
                kind = ?self.kind,
                error = %self,
                source = ?self.source,
                "Request failed"
            );
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&error_id);

        HttpResponse::build(self.status()).json(self.to_response_body(&error_id, exposes_detail()))
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-operation context attached to business log lines
///
/// `operation_id` names one service call. It is distinct from the
/// `x-request-id` that `LoggerMiddleware` puts on the access log.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation_id: String,
    pub user_id: Option<i64>,
    pub operation: &'static str,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation,
        }
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        if error.kind.is_operational() {
            tracing::warn!(
                operation_id = %self.operation_id,
                operation = self.operation,
                user_id = ?self.user_id,
                error = %error,
                "Operation rejected"
            );
        } else {
            tracing::error!(
                operation_id = %self.operation_id,
                operation = self.operation,
                user_id = ?self.user_id,
                error = %error,
                "Operation failed"
            );
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.operation, self.operation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        assert_eq!(ErrorKind::Validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_operational_message_is_kept() {
        let err = AppError::not_found("User not found");
        let body = err.to_response_body("test-123", false);

        assert!(!body.success);
        assert_eq!(body.status, "failed");
        assert_eq!(body.code, "NOT_FOUND");
        assert_eq!(body.message, "User not found");
        assert_eq!(body.error_id, "test-123");
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let err = AppError::internal("connection string leaked here");
        let body = err.to_response_body("test-123", false);

        assert_eq!(body.status, "error");
        assert_eq!(body.message, "Internal server error");
        assert!(body.detail.is_none());
    }

    #[test]
    fn test_detail_only_when_exposed() {
        let err = AppError::internal("boom")
            .with_source(std::io::Error::new(std::io::ErrorKind::Other, "disk"));

        assert!(err.to_response_body("id", true).detail.is_some());
        assert!(err.to_response_body("id", false).detail.is_none());
    }

    #[test]
    fn test_validation_fields_serialized() {
        let err = AppError::validation_fields(vec![
            FieldError::new("email", "email is required"),
            FieldError::new("password", "password is too short"),
        ]);
        let body = serde_json::to_value(err.to_response_body("id", false)).unwrap();

        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"][0]["field"], "email");
        assert_eq!(body["errors"][1]["field"], "password");
        assert_eq!(body["errorId"], "id");
    }

    #[test]
    fn test_errors_omitted_when_empty() {
        let body = serde_json::to_value(AppError::conflict("dup").to_response_body("id", false))
            .unwrap();
        assert!(body.get("errors").is_none());
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_pool_timeout_maps_to_unavailable() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.kind, ErrorKind::Unavailable);
        assert!(!err.kind.is_operational());
    }

    #[test]
    fn test_constraint_field_mapping() {
        assert_eq!(field_for_constraint(Some("users_email_active_key")), "email");
        assert_eq!(field_for_constraint(Some("users_phone_active_key")), "phone");
        assert_eq!(field_for_constraint(Some("users_username_active_key")), "username");
        assert_eq!(field_for_constraint(None), "value");
    }

    #[test]
    fn test_token_errors_map_to_401() {
        let expired: AppError = TokenError::Expired.into();
        let forged: AppError = TokenError::InvalidSignature.into();

        assert_eq!(expired.kind, ErrorKind::Unauthorized);
        assert_eq!(forged.kind, ErrorKind::Unauthorized);
    }

    #[test]
    fn test_error_context_ids_are_per_operation() {
        let first = ErrorContext::new("user_login").with_user_id(7);
        let second = ErrorContext::new("user_login");

        assert_ne!(first.operation_id, second.operation_id);
        assert_eq!(first.user_id, Some(7));
        assert_eq!(
            first.to_string(),
            format!("user_login [{}]", first.operation_id)
        );
    }
}
