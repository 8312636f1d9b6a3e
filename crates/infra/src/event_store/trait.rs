use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use replica_core::{AggregateId, ExpectedVersion, NamedAggregate};
use replica_events::{DomainEvent, ErrorInfo, codes};

/// Cursor value that starts a scan from the beginning.
pub const DEFAULT_CURSOR_ID: &str = "(0)";

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, isolation) as
/// opposed to domain errors (validation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl ErrorInfo for EventStoreError {
    fn error_code(&self) -> &str {
        match self {
            EventStoreError::Concurrency(_) => codes::EVENT_VERSION_CONFLICT,
            EventStoreError::TenantIsolation(_) | EventStoreError::Storage(_) => {
                codes::ILLEGAL_STATE
            }
            EventStoreError::InvalidAppend(_) => codes::BAD_REQUEST,
        }
    }

    fn error_msg(&self) -> String {
        self.to_string()
    }
}

/// Append-only, tenant-scoped event store.
///
/// Events are organized into **streams**, one per aggregate instance. The
/// [`AggregateId`] (which carries the tenant) is the stream key. Within a
/// stream, versions start at 1 and increase by exactly 1.
///
/// ## Append Semantics
///
/// `append()`:
/// - Validates that the batch targets a single stream
/// - Checks optimistic concurrency against the current stream version
/// - Requires the batch versions to continue the stream without gaps
/// - Persists the batch atomically (all or nothing)
///
/// ## Load Semantics
///
/// `load()` returns the events with `head_version <= version <= tail_version`
/// in ascending version order, or an empty vector when there are none.
/// `tail_version` may be [`TailVersion::LATEST`](replica_core::TailVersion::LATEST).
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(
        &self,
        events: Vec<DomainEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<DomainEvent>, EventStoreError>;

    async fn load(
        &self,
        aggregate_id: &AggregateId,
        head_version: u64,
        tail_version: u64,
    ) -> Result<Vec<DomainEvent>, EventStoreError>;

    /// Ids of `named_aggregate` with `id > cursor_id`, ordered by id, at most `limit`.
    async fn scan_aggregate_id(
        &self,
        named_aggregate: &NamedAggregate,
        cursor_id: &str,
        limit: usize,
    ) -> Result<Vec<AggregateId>, EventStoreError>;
}

#[async_trait]
impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    async fn append(
        &self,
        events: Vec<DomainEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        (**self).append(events, expected_version).await
    }

    async fn load(
        &self,
        aggregate_id: &AggregateId,
        head_version: u64,
        tail_version: u64,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        (**self).load(aggregate_id, head_version, tail_version).await
    }

    async fn scan_aggregate_id(
        &self,
        named_aggregate: &NamedAggregate,
        cursor_id: &str,
        limit: usize,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        (**self)
            .scan_aggregate_id(named_aggregate, cursor_id, limit)
            .await
    }
}

/// Check that a batch targets one stream and continues it without gaps.
pub(crate) fn validate_batch(
    events: &[DomainEvent],
    current_version: u64,
) -> Result<(), EventStoreError> {
    let Some(first) = events.first() else {
        return Ok(());
    };
    let aggregate_id = first.aggregate_id();

    for (idx, e) in events.iter().enumerate() {
        if e.tenant_id() != aggregate_id.tenant_id() {
            return Err(EventStoreError::TenantIsolation(format!(
                "batch contains multiple tenant_ids (index {idx})"
            )));
        }
        if e.aggregate_id() != aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "batch contains multiple aggregate_ids (index {idx})"
            )));
        }
        let expected = current_version + 1 + idx as u64;
        if e.version() < expected && idx == 0 {
            return Err(EventStoreError::Concurrency(format!(
                "version {} already exists in stream {aggregate_id} (current {current_version})",
                e.version()
            )));
        }
        if e.version() != expected {
            return Err(EventStoreError::InvalidAppend(format!(
                "non-contiguous version at index {idx}: expected {expected}, got {}",
                e.version()
            )));
        }
    }
    Ok(())
}
