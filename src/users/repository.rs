/// User and store persistence
///
/// Free functions over any Postgres executor, so a caller can run them on
/// the pool or inside an open transaction. Every tenant-scoped function
/// takes the store id and filters by it in SQL.

use chrono::Utc;
use serde::Deserialize;
use sqlx::postgres::{PgExecutor, Postgres};
use sqlx::{PgPool, QueryBuilder};

use crate::domain::{Role, Store, User, UserRow, DEFAULT_PLAN};
use crate::error::AppError;

const USER_COLUMNS: &str = "id, name, email, phone, username, password_hash, role, store_id, \
                            is_active, is_deleted, created_at, updated_at";

/// Fields of a user about to be inserted
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub store_id: i64,
    pub is_active: bool,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Name,
    Email,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Email => "email",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Validated filter and page for a user listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFilter {
    pub page: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: None,
            role: None,
            is_active: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl UserFilter {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, AppError> {
    row.map(User::try_from).transpose()
}

/// Find a non-deleted user whose email, phone or username equals `identifier`
///
/// An email match wins over a phone match, which wins over a username match.
pub async fn find_by_identifier<'e, E: PgExecutor<'e>>(
    executor: E,
    identifier: &str,
) -> Result<Option<User>, AppError> {
    let sql = format!(
        "SELECT {} FROM users \
         WHERE NOT is_deleted AND (email = LOWER($1) OR phone = $1 OR username = $1) \
         ORDER BY CASE WHEN email = LOWER($1) THEN 0 WHEN phone = $1 THEN 1 ELSE 2 END, id \
         LIMIT 1",
        USER_COLUMNS
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(identifier)
        .fetch_optional(executor)
        .await?;

    into_user(row)
}

pub async fn find_by_email<'e, E: PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<User>, AppError> {
    let sql = format!(
        "SELECT {} FROM users WHERE email = LOWER($1) AND NOT is_deleted",
        USER_COLUMNS
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(email)
        .fetch_optional(executor)
        .await?;

    into_user(row)
}

/// Non-deleted user by id, regardless of store
pub async fn find_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<User>, AppError> {
    let sql = format!(
        "SELECT {} FROM users WHERE id = $1 AND NOT is_deleted",
        USER_COLUMNS
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    into_user(row)
}

/// Non-deleted user by id within one store
pub async fn find_in_store<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    store_id: i64,
) -> Result<Option<User>, AppError> {
    let sql = format!(
        "SELECT {} FROM users WHERE id = $1 AND store_id = $2 AND NOT is_deleted",
        USER_COLUMNS
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .bind(store_id)
        .fetch_optional(executor)
        .await?;

    into_user(row)
}

pub async fn insert_store<'e, E: PgExecutor<'e>>(executor: E, name: &str) -> Result<Store, AppError> {
    let now = Utc::now();
    let store = sqlx::query_as::<_, Store>(
        r#"
        INSERT INTO stores (name, plan, is_active, created_at, updated_at)
        VALUES ($1, $2, TRUE, $3, $3)
        RETURNING id, name, plan, is_active, created_at, updated_at
        "#,
    )
    .bind(name)
    .bind(DEFAULT_PLAN)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok(store)
}

pub async fn insert_user<'e, E: PgExecutor<'e>>(
    executor: E,
    user: &NewUser,
) -> Result<User, AppError> {
    let sql = format!(
        "INSERT INTO users \
         (name, email, phone, username, password_hash, role, store_id, is_active, is_deleted, created_at, updated_at) \
         VALUES ($1, LOWER($2), $3, $4, $5, $6, $7, $8, FALSE, $9, $9) \
         RETURNING {}",
        USER_COLUMNS
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.store_id)
        .bind(user.is_active)
        .bind(Utc::now())
        .fetch_one(executor)
        .await?;

    User::try_from(row)
}

/// Auxiliary store memberships, oldest first
pub async fn membership_store_ids<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: i64,
) -> Result<Vec<i64>, AppError> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT us.store_id
        FROM user_stores us
        JOIN stores s ON s.id = us.store_id
        WHERE us.user_id = $1 AND s.is_active
        ORDER BY us.created_at, us.store_id
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    Ok(ids)
}

/// Escape LIKE wildcards so `search` matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, store_id: i64, filter: &UserFilter) {
    builder.push(" WHERE NOT is_deleted AND store_id = ");
    builder.push_bind(store_id);

    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        builder.push(" AND (name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR email ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(role) = filter.role {
        builder.push(" AND role = ");
        builder.push_bind(role.as_str());
    }
    if let Some(is_active) = filter.is_active {
        builder.push(" AND is_active = ");
        builder.push_bind(is_active);
    }
}

/// One page of a store's users plus the total number matching the filter
pub async fn list_in_store(
    pool: &PgPool,
    store_id: i64,
    filter: &UserFilter,
) -> Result<(Vec<User>, i64), AppError> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
    push_filters(&mut count, store_id, filter);
    let (total,) = count.build_query_as::<(i64,)>().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users", USER_COLUMNS));
    push_filters(&mut select, store_id, filter);
    // Column and direction come from closed enums, never from input text
    select.push(format!(
        " ORDER BY {} {}, id {}",
        filter.sort_by.column(),
        filter.sort_order.keyword(),
        filter.sort_order.keyword()
    ));
    select.push(" LIMIT ");
    select.push_bind(filter.limit);
    select.push(" OFFSET ");
    select.push_bind(filter.offset());

    let users = select
        .build_query_as::<UserRow>()
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok((users, total))
}

/// Apply `changes` to a non-deleted user, within `store_id` when given.
///
/// Returns `None` when no row matched.
pub async fn update_user<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    store_id: Option<i64>,
    changes: &UserChanges,
) -> Result<Option<User>, AppError> {
    let sql = format!(
        "UPDATE users SET \
           name = COALESCE($3, name), \
           email = COALESCE(LOWER($4), email), \
           phone = COALESCE($5, phone), \
           role = COALESCE($6, role), \
           is_active = COALESCE($7, is_active), \
           updated_at = $8 \
         WHERE id = $1 AND ($2::BIGINT IS NULL OR store_id = $2) AND NOT is_deleted \
         RETURNING {}",
        USER_COLUMNS
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .bind(store_id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(&changes.phone)
        .bind(changes.role.map(|role| role.as_str()))
        .bind(changes.is_active)
        .bind(Utc::now())
        .fetch_optional(executor)
        .await?;

    into_user(row)
}

pub async fn update_password<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    password_hash: &str,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1 AND NOT is_deleted",
    )
    .bind(id)
    .bind(password_hash)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Mark a store's user deleted and inactive. Returns the matched row count.
pub async fn soft_delete_in_store<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    store_id: i64,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET is_deleted = TRUE, is_active = FALSE, updated_at = $3
        WHERE id = $1 AND store_id = $2 AND NOT is_deleted
        "#,
    )
    .bind(id)
    .bind(store_id)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_from_page() {
        let filter = UserFilter {
            page: 3,
            limit: 20,
            ..UserFilter::default()
        };

        assert_eq!(filter.offset(), 40);
        assert_eq!(UserFilter::default().offset(), 0);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a_b%c"), r"a\_b\%c");
        assert_eq!(escape_like(r"back\slash"), r"back\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_offset_saturates() {
        let filter = UserFilter {
            page: i64::MAX,
            limit: 100,
            ..UserFilter::default()
        };

        assert_eq!(filter.offset(), i64::MAX);
    }

    #[test]
    fn test_sort_defaults() {
        let filter = UserFilter::default();

        assert_eq!(filter.sort_by.column(), "created_at");
        assert_eq!(filter.sort_order.keyword(), "DESC");
    }
}
