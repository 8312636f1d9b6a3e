use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use replica_core::{AggregateId, IntegrityError, StateRoot};
use replica_events::{ErrorInfo, Snapshot, codes};

/// A state that can be persisted in a snapshot row.
pub trait SnapshotState: StateRoot + Serialize + DeserializeOwned {}

impl<S> SnapshotState for S where S: StateRoot + Serialize + DeserializeOwned {}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("failed to encode snapshot state of {aggregate_id}: {source}")]
    Encode {
        aggregate_id: AggregateId,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode snapshot state of {aggregate_id}: {source}")]
    Decode {
        aggregate_id: AggregateId,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot column '{column}' holds an invalid timestamp: {value}")]
    InvalidTimestamp { column: &'static str, value: i64 },

    #[error("snapshot storage failure: {0}")]
    Storage(String),
}

impl ErrorInfo for SnapshotError {
    fn error_code(&self) -> &str {
        match self {
            SnapshotError::Encode { .. } => codes::BAD_REQUEST,
            _ => codes::ILLEGAL_STATE,
        }
    }

    fn error_msg(&self) -> String {
        self.to_string()
    }
}

/// Cache of the latest known state of aggregates.
///
/// A snapshot is never the source of truth; a missing snapshot is not an
/// error. Implementations must verify that a loaded row belongs to the
/// requested aggregate and tenant.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn load<S: SnapshotState>(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Option<Snapshot<S>>, SnapshotError>;

    async fn save<S: SnapshotState>(&self, snapshot: &Snapshot<S>) -> Result<(), SnapshotError>;
}

#[async_trait]
impl<R> SnapshotRepository for Arc<R>
where
    R: SnapshotRepository + ?Sized,
{
    async fn load<S: SnapshotState>(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Option<Snapshot<S>>, SnapshotError> {
        (**self).load(aggregate_id).await
    }

    async fn save<S: SnapshotState>(&self, snapshot: &Snapshot<S>) -> Result<(), SnapshotError> {
        (**self).save(snapshot).await
    }
}
