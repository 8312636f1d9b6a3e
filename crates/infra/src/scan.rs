//! Batch listing of live aggregates.

use tracing::{debug, instrument};

use replica_core::NamedAggregate;
use replica_events::StateAggregateMetadata;

use crate::event_store::EventStore;
use crate::repository::{LoadError, StateAggregateRepository};
use crate::snapshot::SnapshotState;

/// Pages through the aggregates of one type and returns their current state.
#[derive(Debug, Clone)]
pub struct AggregateScanner<R, E> {
    repository: R,
    events: E,
}

impl<R, E> AggregateScanner<R, E>
where
    R: StateAggregateRepository,
    E: EventStore,
{
    pub fn new(repository: R, events: E) -> Self {
        Self { repository, events }
    }

    /// States of up to `limit` aggregates with id after `cursor_id`.
    ///
    /// Ids are loaded one at a time, in cursor order. Aggregates that were
    /// never initialized or are deleted are left out, so a page may hold fewer
    /// than `limit` states.
    #[instrument(skip(self, metadata), fields(aggregate = %metadata.named_aggregate()), err)]
    pub async fn scan<S: SnapshotState>(
        &self,
        metadata: &StateAggregateMetadata<S>,
        cursor_id: &str,
        limit: usize,
    ) -> Result<Vec<S>, LoadError> {
        let named: &NamedAggregate = metadata.named_aggregate();
        let ids = self
            .events
            .scan_aggregate_id(named, cursor_id, limit)
            .await?;

        let mut states = Vec::with_capacity(ids.len());
        for id in &ids {
            let aggregate = self.repository.load_latest(id, metadata).await?;
            if aggregate.initialized() && !aggregate.deleted() {
                states.push(aggregate.into_state());
            }
        }

        debug!(scanned = ids.len(), returned = states.len(), "scan complete");
        Ok(states)
    }
}
