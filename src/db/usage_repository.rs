//! SQLite usage event log

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::format_timestamp;
use super::store::{StoreResult, UsageSink};
use crate::models::UsageEvent;

#[derive(Clone)]
pub struct SqliteUsageLog {
    pool: SqlitePool,
}

impl SqliteUsageLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageSink for SqliteUsageLog {
    async fn append(&self, event: &UsageEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_events (id, key_id, caller_id, organization_id, service, endpoint,
                                      input_tokens, output_tokens, cost_usd, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.key_id.map(|k| k.to_string()))
        .bind(event.caller_id.to_string())
        .bind(event.organization_id.map(|o| o.to_string()))
        .bind(&event.service)
        .bind(event.endpoint.as_deref())
        .bind(event.input_tokens)
        .bind(event.output_tokens)
        .bind(event.cost_usd)
        .bind(event.metadata.to_string())
        .bind(format_timestamp(event.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
