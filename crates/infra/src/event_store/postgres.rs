//! Postgres-backed event store implementation.
//!
//! Each aggregate type gets its own table, named by [`EventSchema`]. Tenant
//! isolation and contiguous versions are enforced on append; the primary key
//! `(aggregate_id, tenant_id, version)` turns concurrent appends into
//! concurrency errors at the database level.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | EventStoreError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (check constraint violation) | `23514` | `InvalidAppend` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / other | N/A | `Storage` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, instrument};

use replica_core::{AggregateId, CommandId, EventId, ExpectedVersion, NamedAggregate, RequestId};
use replica_events::{DomainEvent, EventMetadata};

use super::r#trait::{EventStore, EventStoreError, validate_batch};

/// Naming of per-aggregate event tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSchema {
    table_suffix: String,
}

impl Default for EventSchema {
    fn default() -> Self {
        Self {
            table_suffix: "_event".to_string(),
        }
    }
}

impl EventSchema {
    pub fn with_table_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.table_suffix = suffix.into();
        self
    }

    /// Quoted table name for `named_aggregate`: `<context>_<aggregate><suffix>`.
    pub fn table(&self, named_aggregate: &NamedAggregate) -> String {
        quote_ident(&format!(
            "{}_{}{}",
            named_aggregate.context_name(),
            named_aggregate.aggregate_name(),
            self.table_suffix
        ))
    }

    /// DDL creating the event table of `named_aggregate` if it is missing.
    pub fn create_table(&self, named_aggregate: &NamedAggregate) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id           TEXT        NOT NULL,
                aggregate_id TEXT        NOT NULL,
                tenant_id    TEXT        NOT NULL,
                version      BIGINT      NOT NULL CHECK (version > 0),
                name         TEXT        NOT NULL,
                body         JSONB       NOT NULL,
                operator     TEXT        NOT NULL DEFAULT '',
                command_id   TEXT        NOT NULL,
                request_id   TEXT        NOT NULL,
                create_time  TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (aggregate_id, tenant_id, version)
            )
            "#,
            table = self.table(named_aggregate)
        )
    }
}

/// Quote a Postgres identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Postgres-backed append-only event store.
///
/// Every query filters on `tenant_id`, so events of another tenant are never
/// loaded or modified by accident. `append()` runs in one transaction.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
    schema: EventSchema,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_schema(pool, EventSchema::default())
    }

    pub fn with_schema(pool: PgPool, schema: EventSchema) -> Self {
        Self {
            pool: Arc::new(pool),
            schema,
        }
    }

    pub fn schema(&self) -> &EventSchema {
        &self.schema
    }

    /// Create the event table of `named_aggregate` if it does not exist yet.
    #[instrument(skip(self), fields(aggregate = %named_aggregate), err)]
    pub async fn ensure_table(&self, named_aggregate: &NamedAggregate) -> Result<(), EventStoreError> {
        sqlx::query(&self.schema.create_table(named_aggregate))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_table", e))?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[instrument(
        skip(self, events),
        fields(
            event_count = events.len(),
            expected_version = ?expected_version,
            committed_events = tracing::field::Empty
        ),
        err
    )]
    async fn append(
        &self,
        events: Vec<DomainEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };
        let aggregate_id = first.aggregate_id().clone();
        let table = self.schema.table(aggregate_id.named_aggregate());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT MAX(version) FROM {table} WHERE aggregate_id = $1 AND tenant_id = $2"
        ))
        .bind(aggregate_id.id())
        .bind(aggregate_id.tenant_id().as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("current_version", e))?;
        let current = current.unwrap_or(0) as u64;

        if !expected_version.matches(current) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }
        if let Err(err) = validate_batch(&events, current) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(err);
        }

        let insert = format!(
            r#"
            INSERT INTO {table} (
                id, aggregate_id, tenant_id, version, name, body,
                operator, command_id, request_id, create_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#
        );
        for event in &events {
            let metadata = event.metadata();
            sqlx::query(&insert)
                .bind(event.id().as_str())
                .bind(aggregate_id.id())
                .bind(aggregate_id.tenant_id().as_str())
                .bind(event.version() as i64)
                .bind(event.name())
                .bind(event.body())
                .bind(&metadata.operator)
                .bind(metadata.command_id.as_str())
                .bind(metadata.request_id.as_str())
                .bind(metadata.create_time)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        EventStoreError::Concurrency(format!(
                            "concurrent append detected: version {} already exists",
                            event.version()
                        ))
                    } else {
                        map_sqlx_error("insert_event", e)
                    }
                })?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("committed_events", events.len());
        Ok(events)
    }

    #[instrument(skip(self), fields(aggregate_id = %aggregate_id), err)]
    async fn load(
        &self,
        aggregate_id: &AggregateId,
        head_version: u64,
        tail_version: u64,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        if head_version > tail_version {
            return Ok(vec![]);
        }
        let table = self.schema.table(aggregate_id.named_aggregate());

        let rows = sqlx::query(&format!(
            r#"
            SELECT id, aggregate_id, tenant_id, version, name, body,
                   operator, command_id, request_id, create_time
            FROM {table}
            WHERE aggregate_id = $1 AND tenant_id = $2 AND version BETWEEN $3 AND $4
            ORDER BY version ASC
            "#
        ))
        .bind(aggregate_id.id())
        .bind(aggregate_id.tenant_id().as_str())
        .bind(to_db_version(head_version))
        .bind(to_db_version(tail_version))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load", e))?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let row = EventRow::from_row(&row).map_err(|e| {
                EventStoreError::Storage(format!("failed to deserialize event row: {e}"))
            })?;
            events.push(row.into_event(aggregate_id.named_aggregate()));
        }
        Ok(events)
    }

    #[instrument(skip(self), fields(aggregate = %named_aggregate), err)]
    async fn scan_aggregate_id(
        &self,
        named_aggregate: &NamedAggregate,
        cursor_id: &str,
        limit: usize,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        let table = self.schema.table(named_aggregate);

        let rows = sqlx::query(&format!(
            r#"
            SELECT DISTINCT aggregate_id, tenant_id
            FROM {table}
            WHERE aggregate_id > $1
            ORDER BY aggregate_id ASC, tenant_id ASC
            LIMIT $2
            "#
        ))
        .bind(cursor_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("scan_aggregate_id", e))?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .try_get("aggregate_id")
                .map_err(|e| map_sqlx_error("scan_aggregate_id", e))?;
            let tenant_id: String = row
                .try_get("tenant_id")
                .map_err(|e| map_sqlx_error("scan_aggregate_id", e))?;
            ids.push(named_aggregate.aggregate_id(id, tenant_id.into()));
        }
        Ok(ids)
    }
}

fn to_db_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

/// Map SQLx errors to `EventStoreError`.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Concurrency(msg),
                Some("23514") => EventStoreError::InvalidAppend(msg),
                _ => EventStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            EventStoreError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => EventStoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

struct EventRow {
    id: String,
    aggregate_id: String,
    tenant_id: String,
    version: i64,
    name: String,
    body: serde_json::Value,
    operator: String,
    command_id: String,
    request_id: String,
    create_time: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for EventRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(EventRow {
            id: row.try_get("id")?,
            aggregate_id: row.try_get("aggregate_id")?,
            tenant_id: row.try_get("tenant_id")?,
            version: row.try_get("version")?,
            name: row.try_get("name")?,
            body: row.try_get("body")?,
            operator: row.try_get("operator")?,
            command_id: row.try_get("command_id")?,
            request_id: row.try_get("request_id")?,
            create_time: row.try_get("create_time")?,
        })
    }
}

impl EventRow {
    fn into_event(self, named_aggregate: &NamedAggregate) -> DomainEvent {
        let metadata = EventMetadata::new(
            CommandId::from(self.command_id),
            RequestId::from(self.request_id),
        )
        .with_operator(self.operator)
        .with_create_time(self.create_time);

        DomainEvent::new(
            EventId::from(self.id),
            named_aggregate.aggregate_id(self.aggregate_id, self.tenant_id.into()),
            self.version as u64,
            self.name,
            self.body,
            metadata,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_named_per_aggregate() {
        let schema = EventSchema::default();
        let named = NamedAggregate::new("sales", "order");
        assert_eq!(schema.table(&named), "\"sales_order_event\"");
        assert!(
            schema
                .create_table(&named)
                .contains("PRIMARY KEY (aggregate_id, tenant_id, version)")
        );
    }

    #[test]
    fn same_aggregate_name_in_two_contexts_gets_two_tables() {
        let schema = EventSchema::default();
        let sales = schema.table(&NamedAggregate::new("sales", "order"));
        let billing = schema.table(&NamedAggregate::new("billing", "order"));
        assert_ne!(sales, billing);
        assert_eq!(billing, "\"billing_order_event\"");
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("bad\"name"), "\"bad\"\"name\"");
    }

    #[test]
    fn latest_tail_fits_in_bigint() {
        assert_eq!(to_db_version(replica_core::TailVersion::LATEST), i64::MAX);
        assert_eq!(to_db_version(7), 7);
    }
}
