use chrono::{DateTime, Utc};
use serde::Serialize;

/// A tenant: the isolation boundary for users and their data
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: i64,
    pub name: String,
    pub plan: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plan given to stores created through self-service registration
pub const DEFAULT_PLAN: &str = "free";
