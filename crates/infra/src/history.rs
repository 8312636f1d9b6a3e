//! Step-by-step state history of one aggregate.

use tracing::{debug, instrument};

use replica_core::{AggregateId, StateRoot, TailVersion};
use replica_events::{StateAggregate, StateAggregateFactory, StateAggregateMetadata};

use crate::event_store::EventStore;
use crate::repository::LoadError;

/// Replays an aggregate from its first event and keeps every intermediate
/// state.
///
/// Snapshots are never consulted: each entry has to be the fold of exactly
/// the events up to its version.
#[derive(Debug, Clone)]
pub struct StateTracer<F, E> {
    factory: F,
    events: E,
}

impl<F, E> StateTracer<F, E>
where
    F: StateAggregateFactory,
    E: EventStore,
{
    pub fn new(factory: F, events: E) -> Self {
        Self { factory, events }
    }

    /// One aggregate per event, in version order; entry `n` is the state
    /// right after version `n + 1` was applied.
    ///
    /// An aggregate with no events yields an empty list.
    #[instrument(skip(self, metadata), fields(aggregate_id = %aggregate_id), err)]
    pub async fn trace<S: StateRoot>(
        &self,
        aggregate_id: &AggregateId,
        metadata: &StateAggregateMetadata<S>,
    ) -> Result<Vec<StateAggregate<S>>, LoadError> {
        let mut aggregate = self.factory.create(metadata, aggregate_id);
        let events = self
            .events
            .load(
                aggregate_id,
                aggregate.expected_next_version(),
                TailVersion::LATEST,
            )
            .await?;

        let mut states = Vec::with_capacity(events.len());
        for event in &events {
            aggregate.on_sourcing(event)?;
            states.push(aggregate.clone());
        }

        debug!(steps = states.len(), "state traced");
        Ok(states)
    }
}
