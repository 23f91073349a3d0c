//! Database layer
//!
//! SQLite-backed storage for:
//! - Encrypted provider keys and their visibility metadata
//! - The append-only usage event log

pub mod key_repository;
pub mod store;
pub mod usage_repository;

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::config::DatabaseConfig;

pub use key_repository::SqliteKeyStore;
pub use store::{KeyPlacement, KeyStore, StoreError, StoreResult, UsageSink};
pub use usage_repository::SqliteUsageLog;

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool and apply migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid database URL: {}", config.url))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// Check that the database answers a trivial query
pub async fn check_health(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Database health check failed")?;
    Ok(())
}

/// Timestamps are stored as RFC 3339 with microseconds so they sort lexically
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(ts: &str) -> StoreResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
    }
    Err(StoreError::Corrupt(format!("unparseable timestamp: {}", ts)))
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| StoreError::Corrupt(format!("invalid {}: {}", column, value)))
}
