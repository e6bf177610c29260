use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Role;
use crate::error::AppError;

/// Stored user record, including the password hash.
///
/// Never serialized; convert to `PublicUser` before it leaves the service.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub store_id: i64,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape as read from the `users` table
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub store_id: i64,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(|e| {
            AppError::internal(format!("Corrupt role for user {}: {}", row.id, e))
        })?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            username: row.username,
            password_hash: row.password_hash,
            role,
            store_id: row.store_id,
            is_active: row.is_active,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// User as returned by the API: no password hash, no deletion flag
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub role: Role,
    pub store_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            username: user.username,
            role: user.role,
            store_id: user.store_id,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
