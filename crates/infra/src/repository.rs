//! Event-sourced reconstruction of aggregate state.
//!
//! Loading an aggregate runs this pipeline:
//!
//! ```text
//! tail = Latest?
//!   ├─ yes → snapshot repository (cached state) ─┐
//!   │        └─ none → factory (empty state) ────┤
//!   └─ no  → factory (empty state) ──────────────┤
//!                                                ↓
//!        event store: [expected_next_version, tail]
//!                                                ↓
//!                  fold each event (on_sourcing) in order
//! ```
//!
//! A snapshot only represents the latest known state, so it can never seed a
//! replay that stops at an explicit, possibly older, version.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use replica_core::{AggregateId, IntegrityError, TailVersion};
use replica_events::{
    ErrorInfo, SourcingError, StateAggregate, StateAggregateFactory, StateAggregateMetadata,
    codes,
};

use crate::event_store::{EventStore, EventStoreError};
use crate::snapshot::{SnapshotError, SnapshotRepository, SnapshotState};

/// Failure while reconstructing an aggregate.
///
/// Store failures are carried unchanged; no partial aggregate is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Sourcing(#[from] SourcingError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

impl ErrorInfo for LoadError {
    fn error_code(&self) -> &str {
        match self {
            LoadError::Snapshot(err) => err.error_code(),
            LoadError::EventStore(err) => err.error_code(),
            LoadError::Sourcing(SourcingError::Decode { .. }) => codes::BAD_REQUEST,
            LoadError::Sourcing(SourcingError::Integrity(_)) | LoadError::Integrity(_) => {
                codes::ILLEGAL_STATE
            }
        }
    }

    fn error_msg(&self) -> String {
        self.to_string()
    }
}

/// Loads materialized aggregates.
#[async_trait]
pub trait StateAggregateRepository: Send + Sync {
    async fn load<S: SnapshotState>(
        &self,
        aggregate_id: &AggregateId,
        metadata: &StateAggregateMetadata<S>,
        tail_version: TailVersion,
    ) -> Result<StateAggregate<S>, LoadError>;

    async fn load_latest<S: SnapshotState>(
        &self,
        aggregate_id: &AggregateId,
        metadata: &StateAggregateMetadata<S>,
    ) -> Result<StateAggregate<S>, LoadError> {
        self.load(aggregate_id, metadata, TailVersion::Latest).await
    }
}

/// Rebuilds aggregates from a snapshot (when allowed) plus the events after it.
#[derive(Debug, Clone)]
pub struct EventSourcingStateAggregateRepository<F, R, E> {
    factory: F,
    snapshots: R,
    events: E,
}

impl<F, R, E> EventSourcingStateAggregateRepository<F, R, E> {
    pub fn new(factory: F, snapshots: R, events: E) -> Self {
        Self {
            factory,
            snapshots,
            events,
        }
    }
}

#[async_trait]
impl<F, R, E> StateAggregateRepository for EventSourcingStateAggregateRepository<F, R, E>
where
    F: StateAggregateFactory,
    R: SnapshotRepository,
    E: EventStore,
{
    #[instrument(
        skip(self, metadata),
        fields(aggregate_id = %aggregate_id, tail_version = ?tail_version),
        err
    )]
    async fn load<S: SnapshotState>(
        &self,
        aggregate_id: &AggregateId,
        metadata: &StateAggregateMetadata<S>,
        tail_version: TailVersion,
    ) -> Result<StateAggregate<S>, LoadError> {
        debug!("loading aggregate");

        let mut aggregate = match tail_version {
            TailVersion::Latest => match self.snapshots.load::<S>(aggregate_id).await? {
                Some(snapshot) => {
                    debug!(snapshot_version = snapshot.version(), "starting from snapshot");
                    snapshot.into_state_aggregate()
                }
                None => self.factory.create(metadata, aggregate_id),
            },
            TailVersion::Exact(_) => self.factory.create(metadata, aggregate_id),
        };

        let tail = tail_version.as_u64();
        let events = self
            .events
            .load(aggregate_id, aggregate.expected_next_version(), tail)
            .await?;

        for event in &events {
            if event.version() > tail {
                return Err(IntegrityError::BeyondTailVersion {
                    aggregate_id: aggregate_id.clone(),
                    tail,
                    actual: event.version(),
                }
                .into());
            }
            aggregate.on_sourcing(event)?;
        }

        debug!(
            version = aggregate.version(),
            replayed = events.len(),
            "aggregate loaded"
        );
        Ok(aggregate)
    }
}
