use crate::auth::claims::Claims;
use crate::domain::Role;
use crate::error::AppError;

/// The authenticated caller, as established from a verified access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: Role,
    pub store_id: Option<i64>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Store every tenant-scoped query is filtered by
    ///
    /// # Errors
    /// Forbidden when the token was issued without a tenant
    pub fn tenant(&self) -> Result<i64, AppError> {
        self.store_id
            .ok_or_else(|| AppError::forbidden("No store selected for this session"))
    }
}

impl TryFrom<&Claims> for Identity {
    type Error = AppError;

    fn try_from(claims: &Claims) -> Result<Self, Self::Error> {
        Ok(Identity {
            user_id: claims.user_id()?,
            role: claims.role,
            store_id: claims.store_id,
        })
    }
}
