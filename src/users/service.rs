/// User administration within a tenant
///
/// Every query carries the caller's store id, so a user of another store
/// is indistinguishable from one that does not exist.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::refresh_token::revoke_all_user_tokens;
use crate::auth::{Identity, PasswordHasher};
use crate::domain::{PublicUser, Role};
use crate::error::AppError;
use crate::users::repository::{self, NewUser, SortField, SortOrder, UserChanges, UserFilter};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub is_active: Option<bool>,
    pub store_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Raw query string of `GET /users`; checked into a `UserFilter`
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<PublicUser>,
    pub pagination: Pagination,
}

fn user_not_found() -> AppError {
    AppError::not_found("User not found")
}

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(pool: PgPool, hasher: PasswordHasher) -> Self {
        Self { pool, hasher }
    }

    pub async fn create(
        &self,
        caller: &Identity,
        request: CreateUserRequest,
    ) -> Result<PublicUser, AppError> {
        let tenant = caller.tenant()?;
        let store_id = match request.store_id {
            None => tenant,
            Some(id) if id == tenant => id,
            Some(id) => {
                let memberships = repository::membership_store_ids(&self.pool, caller.user_id).await?;
                if !memberships.contains(&id) {
                    return Err(AppError::forbidden("You do not have access to this store"));
                }
                id
            }
        };

        let password_hash = self.hasher.hash_blocking(request.password).await?;
        let user = repository::insert_user(
            &self.pool,
            &NewUser {
                name: request.name,
                email: request.email,
                phone: request.phone,
                username: request.username,
                password_hash,
                role: request.role.unwrap_or(Role::User),
                store_id,
                is_active: request.is_active.unwrap_or(true),
            },
        )
        .await?;

        tracing::info!(
            user_id = user.id,
            store_id = store_id,
            created_by = caller.user_id,
            role = %user.role,
            "User created"
        );
        Ok(user.into())
    }

    pub async fn list(&self, caller: &Identity, filter: &UserFilter) -> Result<UserPage, AppError> {
        let tenant = caller.tenant()?;
        let (users, total) = repository::list_in_store(&self.pool, tenant, filter).await?;

        Ok(UserPage {
            users: users.into_iter().map(PublicUser::from).collect(),
            pagination: Pagination::new(filter.page, filter.limit, total),
        })
    }

    pub async fn get(&self, caller: &Identity, id: i64) -> Result<PublicUser, AppError> {
        let tenant = caller.tenant()?;
        repository::find_in_store(&self.pool, id, tenant)
            .await?
            .map(PublicUser::from)
            .ok_or_else(user_not_found)
    }

    /// Update a user of the caller's store.
    ///
    /// Non-admins may only touch themselves and never their role or status.
    pub async fn update(
        &self,
        caller: &Identity,
        id: i64,
        request: UpdateUserRequest,
    ) -> Result<PublicUser, AppError> {
        let tenant = caller.tenant()?;
        if !caller.is_admin() {
            if id != caller.user_id {
                return Err(AppError::forbidden("You can only update your own account"));
            }
            if request.role.is_some() || request.is_active.is_some() {
                return Err(AppError::forbidden(
                    "Only an administrator can change role or status",
                ));
            }
        }

        let changes = UserChanges {
            name: request.name,
            email: request.email,
            phone: request.phone,
            role: request.role,
            is_active: request.is_active,
        };
        let user = repository::update_user(&self.pool, id, Some(tenant), &changes)
            .await?
            .ok_or_else(user_not_found)?;

        tracing::info!(user_id = id, updated_by = caller.user_id, "User updated");
        Ok(user.into())
    }

    /// Change a password and revoke every refresh token of its owner.
    ///
    /// Changing one's own password always requires the current one.
    pub async fn change_password(
        &self,
        caller: &Identity,
        id: i64,
        request: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        let tenant = caller.tenant()?;
        let own_account = id == caller.user_id;
        if !caller.is_admin() && !own_account {
            return Err(AppError::forbidden("You can only change your own password"));
        }
        if request.new_password != request.new_password_confirm {
            return Err(AppError::validation("Passwords do not match"));
        }

        let user = repository::find_in_store(&self.pool, id, tenant)
            .await?
            .ok_or_else(user_not_found)?;

        if own_account {
            let current = request
                .current_password
                .ok_or_else(|| AppError::validation("Current password is required"))?;
            let valid = self
                .hasher
                .verify_blocking(current, user.password_hash.clone())
                .await?;
            if !valid {
                return Err(AppError::unauthorized("Current password is incorrect"));
            }
        }

        let password_hash = self.hasher.hash_blocking(request.new_password).await?;

        let mut tx = self.pool.begin().await?;
        repository::update_password(&mut *tx, user.id, &password_hash).await?;
        revoke_all_user_tokens(&mut *tx, user.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = id, changed_by = caller.user_id, "Password changed");
        Ok(())
    }

    /// Soft-delete a user of the caller's store and end their sessions.
    pub async fn delete(&self, caller: &Identity, id: i64) -> Result<(), AppError> {
        let tenant = caller.tenant()?;
        if id == caller.user_id {
            return Err(AppError::forbidden("You cannot delete your own account"));
        }

        let mut tx = self.pool.begin().await?;
        if repository::soft_delete_in_store(&mut *tx, id, tenant).await? == 0 {
            return Err(user_not_found());
        }
        revoke_all_user_tokens(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(user_id = id, deleted_by = caller.user_id, "User deleted");
        Ok(())
    }

    /// The caller's own record, wherever their owning store is
    pub async fn profile(&self, caller: &Identity) -> Result<PublicUser, AppError> {
        repository::find_by_id(&self.pool, caller.user_id)
            .await?
            .map(PublicUser::from)
            .ok_or_else(user_not_found)
    }

    pub async fn update_profile(
        &self,
        caller: &Identity,
        request: UpdateProfileRequest,
    ) -> Result<PublicUser, AppError> {
        let changes = UserChanges {
            name: request.name,
            email: request.email,
            phone: request.phone,
            ..UserChanges::default()
        };
        let user = repository::update_user(&self.pool, caller.user_id, None, &changes)
            .await?
            .ok_or_else(user_not_found)?;

        tracing::info!(user_id = caller.user_id, "Profile updated");
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_rounds_up() {
        assert_eq!(Pagination::new(1, 10, 25).pages, 3);
        assert_eq!(Pagination::new(1, 10, 30).pages, 3);
        assert_eq!(Pagination::new(1, 10, 0).pages, 0);
        assert_eq!(Pagination::new(2, 100, 1).pages, 1);
    }

    #[test]
    fn test_list_query_parses_enums() {
        let query: ListUsersQuery = serde_json::from_str(
            r#"{"page": 2, "role": "cashier", "sortBy": "updatedAt", "sortOrder": "asc"}"#,
        )
        .unwrap();

        assert_eq!(query.page, Some(2));
        assert_eq!(query.role, Some(Role::Cashier));
        assert_eq!(query.sort_by, Some(SortField::UpdatedAt));
        assert_eq!(query.sort_order, Some(SortOrder::Asc));
    }

    #[test]
    fn test_create_request_optional_fields_default() {
        let request: CreateUserRequest = serde_json::from_str(
            r#"{"name": "Bob", "email": "bob@example.com", "password": "Secret1!"}"#,
        )
        .unwrap();

        assert_eq!(request.role, None);
        assert_eq!(request.is_active, None);
        assert_eq!(request.store_id, None);
    }
}
