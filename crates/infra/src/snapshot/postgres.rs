//! Postgres-backed snapshot repository.
//!
//! One table per aggregate type, named after its bounded context and
//! aggregate, keyed by aggregate id and tenant. The stored row is still
//! re-checked against the requested id on every read.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Row};
use tracing::{debug, instrument};

use replica_core::{AggregateId, NamedAggregate};
use replica_events::Snapshot;

use super::record::SnapshotRecord;
use super::repository::{SnapshotError, SnapshotRepository, SnapshotState};
use crate::event_store::postgres::quote_ident;

/// Naming and SQL of per-aggregate snapshot tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSchema {
    table_suffix: String,
}

impl Default for SnapshotSchema {
    fn default() -> Self {
        Self {
            table_suffix: "_snapshot".to_string(),
        }
    }
}

impl SnapshotSchema {
    pub fn with_table_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.table_suffix = suffix.into();
        self
    }

    pub fn table(&self, named_aggregate: &NamedAggregate) -> String {
        quote_ident(&format!(
            "{}_{}{}",
            named_aggregate.context_name(),
            named_aggregate.aggregate_name(),
            self.table_suffix
        ))
    }

    pub fn create_table(&self, named_aggregate: &NamedAggregate) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                aggregate_id     TEXT    NOT NULL,
                tenant_id        TEXT    NOT NULL,
                version          BIGINT  NOT NULL,
                state_type       TEXT    NOT NULL,
                state            TEXT    NOT NULL,
                event_id         TEXT,
                first_operator   TEXT,
                operator         TEXT,
                first_event_time BIGINT,
                event_time       BIGINT,
                snapshot_time    BIGINT  NOT NULL,
                deleted          BOOLEAN NOT NULL,
                PRIMARY KEY (aggregate_id, tenant_id)
            )
            "#,
            table = self.table(named_aggregate)
        )
    }

    pub fn load(&self, named_aggregate: &NamedAggregate) -> String {
        format!(
            r#"
            SELECT aggregate_id, tenant_id, version, state_type, state, event_id,
                   first_operator, operator, first_event_time, event_time,
                   snapshot_time, deleted
            FROM {table}
            WHERE aggregate_id = $1 AND tenant_id = $2
            LIMIT 1
            "#,
            table = self.table(named_aggregate)
        )
    }

    pub fn save(&self, named_aggregate: &NamedAggregate) -> String {
        format!(
            r#"
            INSERT INTO {table} (
                aggregate_id, tenant_id, version, state_type, state, event_id,
                first_operator, operator, first_event_time, event_time,
                snapshot_time, deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (aggregate_id, tenant_id)
            DO UPDATE SET
                version = EXCLUDED.version,
                state_type = EXCLUDED.state_type,
                state = EXCLUDED.state,
                event_id = EXCLUDED.event_id,
                first_operator = EXCLUDED.first_operator,
                operator = EXCLUDED.operator,
                first_event_time = EXCLUDED.first_event_time,
                event_time = EXCLUDED.event_time,
                snapshot_time = EXCLUDED.snapshot_time,
                deleted = EXCLUDED.deleted
            "#,
            table = self.table(named_aggregate)
        )
    }
}

#[derive(Debug, Clone)]
pub struct PostgresSnapshotRepository {
    pool: Arc<PgPool>,
    schema: SnapshotSchema,
}

impl PostgresSnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self::with_schema(pool, SnapshotSchema::default())
    }

    pub fn with_schema(pool: PgPool, schema: SnapshotSchema) -> Self {
        Self {
            pool: Arc::new(pool),
            schema,
        }
    }

    #[instrument(skip(self), fields(aggregate = %named_aggregate), err)]
    pub async fn ensure_table(&self, named_aggregate: &NamedAggregate) -> Result<(), SnapshotError> {
        sqlx::query(&self.schema.create_table(named_aggregate))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_table", e))?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotRepository for PostgresSnapshotRepository {
    #[instrument(skip(self), fields(aggregate_id = %aggregate_id), err)]
    async fn load<S: SnapshotState>(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Option<Snapshot<S>>, SnapshotError> {
        let row = sqlx::query(&self.schema.load(aggregate_id.named_aggregate()))
            .bind(aggregate_id.id())
            .bind(aggregate_id.tenant_id().as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_snapshot", e))?;

        let Some(row) = row else {
            debug!("snapshot not found");
            return Ok(None);
        };
        let record = SnapshotRow::from_row(&row)
            .map_err(|e| map_sqlx_error("decode_snapshot", e))?
            .into_record();
        debug!(version = record.version, "snapshot found");
        record.into_snapshot(aggregate_id, None).map(Some)
    }

    #[instrument(
        skip(self, snapshot),
        fields(aggregate_id = %snapshot.aggregate_id(), version = snapshot.version()),
        err
    )]
    async fn save<S: SnapshotState>(&self, snapshot: &Snapshot<S>) -> Result<(), SnapshotError> {
        let record = SnapshotRecord::from_snapshot(snapshot)?;

        sqlx::query(&self.schema.save(snapshot.aggregate_id().named_aggregate()))
            .bind(&record.aggregate_id)
            .bind(&record.tenant_id)
            .bind(i64::try_from(record.version).unwrap_or(i64::MAX))
            .bind(&record.state_type)
            .bind(&record.state)
            .bind(&record.event_id)
            .bind(&record.first_operator)
            .bind(&record.operator)
            .bind(record.first_event_time)
            .bind(record.event_time)
            .bind(record.snapshot_time)
            .bind(record.deleted)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("save_snapshot", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> SnapshotError {
    SnapshotError::Storage(format!("sqlx error in {operation}: {err}"))
}

struct SnapshotRow {
    aggregate_id: String,
    tenant_id: String,
    version: i64,
    state_type: String,
    state: String,
    event_id: Option<String>,
    first_operator: Option<String>,
    operator: Option<String>,
    first_event_time: Option<i64>,
    event_time: Option<i64>,
    snapshot_time: i64,
    deleted: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SnapshotRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(SnapshotRow {
            aggregate_id: row.try_get("aggregate_id")?,
            tenant_id: row.try_get("tenant_id")?,
            version: row.try_get("version")?,
            state_type: row.try_get("state_type")?,
            state: row.try_get("state")?,
            event_id: row.try_get("event_id")?,
            first_operator: row.try_get("first_operator")?,
            operator: row.try_get("operator")?,
            first_event_time: row.try_get("first_event_time")?,
            event_time: row.try_get("event_time")?,
            snapshot_time: row.try_get("snapshot_time")?,
            deleted: row.try_get("deleted")?,
        })
    }
}

impl SnapshotRow {
    fn into_record(self) -> SnapshotRecord {
        SnapshotRecord {
            aggregate_id: self.aggregate_id,
            tenant_id: self.tenant_id,
            version: self.version.max(0) as u64,
            state_type: self.state_type,
            state: self.state,
            event_id: self.event_id,
            first_operator: self.first_operator,
            operator: self.operator,
            first_event_time: self.first_event_time,
            event_time: self.event_time,
            snapshot_time: self.snapshot_time,
            deleted: self.deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_binds_twelve_columns_and_upserts_by_id_and_tenant() {
        let sql = SnapshotSchema::default().save(&NamedAggregate::new("sales", "order"));
        assert!(sql.contains("INSERT INTO \"sales_order_snapshot\""));
        assert!(sql.contains("$12"));
        assert!(sql.contains("ON CONFLICT (aggregate_id, tenant_id)"));
        assert!(!sql.contains("tenant_id = EXCLUDED.tenant_id"));
    }

    #[test]
    fn load_looks_up_by_aggregate_id_and_tenant() {
        let sql = SnapshotSchema::default().load(&NamedAggregate::new("sales", "order"));
        assert!(sql.contains("WHERE aggregate_id = $1 AND tenant_id = $2"));
    }

    #[test]
    fn table_is_keyed_by_id_and_tenant() {
        let sql = SnapshotSchema::default().create_table(&NamedAggregate::new("sales", "order"));
        assert!(sql.contains("PRIMARY KEY (aggregate_id, tenant_id)"));
        assert!(!sql.contains("NOT NULL PRIMARY KEY"));
    }

    #[test]
    fn same_aggregate_name_in_two_contexts_gets_two_tables() {
        let schema = SnapshotSchema::default();
        let sales = schema.table(&NamedAggregate::new("sales", "order"));
        let billing = schema.table(&NamedAggregate::new("billing", "order"));
        assert_eq!(sales, "\"sales_order_snapshot\"");
        assert_eq!(billing, "\"billing_order_snapshot\"");
        assert_ne!(sales, billing);
    }
}
