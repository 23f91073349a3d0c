//! Storage collaborator contracts
//!
//! The broker core only talks to storage through these traits. The SQLite
//! implementations live next door; tests substitute in-memory doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{KeyRecord, UsageEvent, VisibilityScope};
use crate::services::access_policy::VisibilityFilter;

/// Storage collaborator failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("store operation timed out")]
    Timeout,

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A conditional write kept losing to concurrent writers
    #[error("record {0} changed concurrently")]
    Conflict(Uuid),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Where a key sits: the values access decisions are made against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPlacement {
    pub scope: VisibilityScope,
    pub organization_id: Option<Uuid>,
}

impl KeyPlacement {
    pub fn new(scope: VisibilityScope, organization_id: Option<Uuid>) -> Self {
        Self {
            scope,
            organization_id,
        }
    }

    pub fn of(record: &KeyRecord) -> Self {
        Self::new(record.scope, record.organization_id)
    }

    pub fn matches(&self, record: &KeyRecord) -> bool {
        *self == Self::of(record)
    }
}

/// Durable table of provider key records
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Active records for `service` admitted by `filter`
    async fn find_active(&self, service: &str, filter: &VisibilityFilter) -> StoreResult<Vec<KeyRecord>>;

    /// Records admitted by `filter`, newest first
    async fn list(&self, filter: &VisibilityFilter, service: Option<&str>) -> StoreResult<Vec<KeyRecord>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<KeyRecord>>;

    async fn insert(&self, record: &KeyRecord) -> StoreResult<()>;

    /// Move the record to `target`, only while it still sits at `expected`.
    /// Returns false if the record is gone or has moved.
    async fn update_scope(
        &self,
        id: Uuid,
        expected: KeyPlacement,
        target: KeyPlacement,
    ) -> StoreResult<bool>;

    /// Delete the record, only while it still sits at `expected`.
    /// Returns false if the record is gone or has moved.
    async fn delete(&self, id: Uuid, expected: KeyPlacement) -> StoreResult<bool>;

    /// Atomically increment `usage_count` and set `last_used_at`
    async fn record_use(&self, id: Uuid, used_at: DateTime<Utc>) -> StoreResult<()>;
}

/// Append-only sink for usage events
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn append(&self, event: &UsageEvent) -> StoreResult<()>;
}
