mod models;
mod seeders;

pub use models::*;
pub use seeders::{ensure_admin_user, seed_demo_accounts};

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub type DbPool = SqlitePool;

/// Fixed-width UTC timestamp so stored values sort lexicographically
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("panchsutra.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// In-memory database with the full schema. A single connection keeps every
/// query on the same memory database.
pub async fn init_in_memory() -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Users and sessions
    execute_sql(pool, include_str!("../../migrations/001_users.sql")).await?;

    // Migration 002: Appointments
    execute_sql(pool, include_str!("../../migrations/002_appointments.sql")).await?;

    // Migration 003: Notification feed
    execute_sql(pool, include_str!("../../migrations/003_notifications.sql")).await?;

    // Migration 004: Password reset tokens and phone codes
    let has_password_resets: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='password_resets'",
    )
    .fetch_optional(pool)
    .await?;
    if has_password_resets.is_none() {
        execute_sql(pool, include_str!("../../migrations/004_credentials.sql")).await?;
    }

    // Migration 005: Failed attempt counter on phone codes
    let has_failed_attempts: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM pragma_table_info('phone_otps') WHERE name = 'failed_attempts'",
    )
    .fetch_optional(pool)
    .await?;
    if has_failed_attempts.is_none() {
        execute_sql(pool, include_str!("../../migrations/005_otp_attempts.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

        for expected in [
            "appointments",
            "notifications",
            "password_resets",
            "phone_otps",
            "sessions",
            "users",
        ] {
            assert!(names.contains(&expected), "missing table {}", expected);
        }
    }

    #[test]
    fn test_timestamp_is_fixed_width() {
        let a = timestamp(DateTime::parse_from_rfc3339("2024-01-20T09:00:00.5Z").unwrap().into());
        let b = timestamp(DateTime::parse_from_rfc3339("2024-01-20T10:00:00Z").unwrap().into());
        assert_eq!(a, "2024-01-20T09:00:00Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }
}
