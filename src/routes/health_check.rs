use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use std::time::Instant;

use crate::error::AppError;

#[derive(sqlx::FromRow)]
struct DatabaseInfo {
    name: String,
    version: String,
    max_connections: i64,
    size_bytes: i64,
}

/// GET /health
///
/// Probes the database and reports a few server metrics. Any failure is a
/// 500 with the standard error envelope.
pub async fn health_check(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    let started = Instant::now();

    let info = sqlx::query_as::<_, DatabaseInfo>(
        r#"
        SELECT current_database()::TEXT AS name,
               version() AS version,
               current_setting('max_connections')::BIGINT AS max_connections,
               pg_database_size(current_database()) AS size_bytes
        "#,
    );
    let tables = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'public'",
    );
    let connections = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM pg_stat_activity WHERE datname = current_database()",
    );

    let (info, tables, connections) = tokio::try_join!(
        info.fetch_one(pool.get_ref()),
        tables.fetch_one(pool.get_ref()),
        connections.fetch_one(pool.get_ref()),
    )
    .map_err(|e| AppError::internal("Database health check failed").with_source(e))?;

    let now = Utc::now();
    tracing::debug!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Health check completed"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": {
            "iso": now.to_rfc3339(),
            "unix": now.timestamp(),
            "ms": now.timestamp_millis(),
        },
        "responseTime": format!("{}ms", started.elapsed().as_millis()),
        "database": {
            "connected": true,
            "name": info.name,
            "version": info.version,
            "maxConnections": info.max_connections,
            "tables": tables,
            "size": format!("{} MB", info.size_bytes / 1024 / 1024),
            "activeConnections": connections,
            "pool": {
                "size": pool.size(),
                "idle": pool.num_idle(),
            },
        },
    })))
}

/// GET /
pub async fn banner() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "PCash API - point of sale back office",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "status": "active",
        "health": "api/v1/health",
    }))
}
