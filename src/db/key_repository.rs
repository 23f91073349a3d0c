//! SQLite provider key repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::store::{KeyPlacement, KeyStore, StoreError, StoreResult};
use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::models::{KeyRecord, VisibilityScope};
use crate::services::access_policy::{VisibilityClause, VisibilityFilter};

const KEY_COLUMNS: &str = "id, service, ciphertext, hint, name, scope, organization_id, owner_id, \
     active, last_used_at, usage_count, created_at";

#[derive(Debug, sqlx::FromRow)]
struct KeyRow {
    id: String,
    service: String,
    ciphertext: String,
    hint: String,
    name: Option<String>,
    scope: String,
    organization_id: Option<String>,
    owner_id: String,
    active: bool,
    last_used_at: Option<String>,
    usage_count: i64,
    created_at: String,
}

#[derive(Clone)]
pub struct SqliteKeyStore {
    pool: SqlitePool,
}

impl SqliteKeyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn select(
        &self,
        service: Option<&str>,
        active_only: bool,
        filter: &VisibilityFilter,
    ) -> StoreResult<Vec<KeyRecord>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM provider_keys WHERE 1 = 1",
            KEY_COLUMNS
        ));

        if let Some(service) = service {
            qb.push(" AND service = ").push_bind(service.to_string());
        }
        if active_only {
            qb.push(" AND active = 1");
        }
        push_visibility(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id");

        let rows = qb
            .build_query_as::<KeyRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_record).collect()
    }
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn find_active(&self, service: &str, filter: &VisibilityFilter) -> StoreResult<Vec<KeyRecord>> {
        self.select(Some(service), true, filter).await
    }

    async fn list(&self, filter: &VisibilityFilter, service: Option<&str>) -> StoreResult<Vec<KeyRecord>> {
        self.select(service, false, filter).await
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<KeyRecord>> {
        let row = sqlx::query_as::<_, KeyRow>(&format!(
            "SELECT {} FROM provider_keys WHERE id = ?",
            KEY_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn insert(&self, record: &KeyRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_keys (id, service, ciphertext, hint, name, scope, organization_id,
                                       owner_id, active, last_used_at, usage_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.service)
        .bind(&record.ciphertext)
        .bind(&record.hint)
        .bind(record.name.as_deref())
        .bind(record.scope.as_str())
        .bind(record.organization_id.map(|o| o.to_string()))
        .bind(record.owner_id.to_string())
        .bind(record.active)
        .bind(record.last_used_at.map(format_timestamp))
        .bind(record.usage_count)
        .bind(format_timestamp(record.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_scope(
        &self,
        id: Uuid,
        expected: KeyPlacement,
        target: KeyPlacement,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE provider_keys SET scope = ?, organization_id = ?
            WHERE id = ? AND scope = ? AND organization_id IS ?
            "#,
        )
        .bind(target.scope.as_str())
        .bind(target.organization_id.map(|o| o.to_string()))
        .bind(id.to_string())
        .bind(expected.scope.as_str())
        .bind(expected.organization_id.map(|o| o.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid, expected: KeyPlacement) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM provider_keys WHERE id = ? AND scope = ? AND organization_id IS ?",
        )
        .bind(id.to_string())
        .bind(expected.scope.as_str())
        .bind(expected.organization_id.map(|o| o.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_use(&self, id: Uuid, used_at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            "UPDATE provider_keys SET usage_count = usage_count + 1, last_used_at = ? WHERE id = ?",
        )
        .bind(format_timestamp(used_at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Compile a visibility filter into bound SQL predicates
fn push_visibility(qb: &mut QueryBuilder<'_, Sqlite>, filter: &VisibilityFilter) {
    let clauses = match filter {
        VisibilityFilter::Unrestricted => return,
        VisibilityFilter::AnyOf(clauses) if clauses.is_empty() => {
            qb.push(" AND 0");
            return;
        }
        VisibilityFilter::AnyOf(clauses) => clauses,
    };

    qb.push(" AND (");
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        match clause {
            VisibilityClause::OwnedBy(owner_id) => {
                qb.push("owner_id = ").push_bind(owner_id.to_string());
            }
            VisibilityClause::SharedWithOrganization {
                organization_id,
                scopes,
            } => {
                qb.push("(organization_id = ")
                    .push_bind(organization_id.to_string())
                    .push(" AND scope IN (");
                {
                    let mut separated = qb.separated(", ");
                    for scope in scopes {
                        separated.push_bind(scope.as_str());
                    }
                }
                qb.push("))");
            }
            VisibilityClause::Platform => {
                qb.push("(organization_id IS NULL AND scope = ")
                    .push_bind(VisibilityScope::Platform.as_str())
                    .push(")");
            }
        }
    }
    qb.push(")");
}

fn row_to_record(row: KeyRow) -> StoreResult<KeyRecord> {
    Ok(KeyRecord {
        id: parse_uuid(&row.id, "id")?,
        scope: row
            .scope
            .parse()
            .map_err(|e: String| StoreError::Corrupt(format!("key {}: {}", row.id, e)))?,
        organization_id: row
            .organization_id
            .as_deref()
            .map(|o| parse_uuid(o, "organization_id"))
            .transpose()?,
        owner_id: parse_uuid(&row.owner_id, "owner_id")?,
        last_used_at: row.last_used_at.as_deref().map(parse_timestamp).transpose()?,
        created_at: parse_timestamp(&row.created_at)?,
        service: row.service,
        ciphertext: row.ciphertext,
        hint: row.hint,
        name: row.name,
        active: row.active,
        usage_count: row.usage_count,
    })
}
