//! Materialized aggregate state and its event-sourcing fold.

use chrono::{DateTime, Utc};
use thiserror::Error;

use replica_core::{AggregateId, EventId, IntegrityError, Lifecycle, NamedAggregate, StateRoot};

use crate::event::DomainEvent;

/// Failure while folding an event into a [`StateAggregate`].
#[derive(Debug, Error)]
pub enum SourcingError {
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("failed to decode event '{name}' (version {version}): {source}")]
    Decode {
        name: String,
        version: u64,
        #[source]
        source: serde_json::Error,
    },
}

/// Static description of an aggregate's state type.
///
/// Carries the aggregate name and how to build the empty state of a new
/// instance.
pub struct StateAggregateMetadata<S> {
    named_aggregate: NamedAggregate,
    constructor: fn(&AggregateId) -> S,
}

impl<S> Clone for StateAggregateMetadata<S> {
    fn clone(&self) -> Self {
        Self {
            named_aggregate: self.named_aggregate.clone(),
            constructor: self.constructor,
        }
    }
}

impl<S> core::fmt::Debug for StateAggregateMetadata<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StateAggregateMetadata")
            .field("named_aggregate", &self.named_aggregate)
            .field("state_type", &core::any::type_name::<S>())
            .finish()
    }
}

impl<S: StateRoot> StateAggregateMetadata<S> {
    pub fn new(
        named_aggregate: NamedAggregate,
        constructor: fn(&AggregateId) -> S,
    ) -> Self {
        Self {
            named_aggregate,
            constructor,
        }
    }

    pub fn named_aggregate(&self) -> &NamedAggregate {
        &self.named_aggregate
    }

    /// Type name persisted next to snapshot rows.
    pub fn state_type(&self) -> &'static str {
        S::state_type()
    }

    /// Build the empty state of a not-yet-existing aggregate.
    pub fn create_state(&self, aggregate_id: &AggregateId) -> S {
        (self.constructor)(aggregate_id)
    }
}

/// Every field of a [`StateAggregate`], used to restore one from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StateAggregateParts<S> {
    pub aggregate_id: AggregateId,
    pub state: S,
    pub version: u64,
    pub event_id: Option<EventId>,
    pub first_operator: String,
    pub operator: String,
    pub first_event_time: Option<DateTime<Utc>>,
    pub event_time: Option<DateTime<Utc>>,
    pub deleted: bool,
}

/// In-memory aggregate state, folded from its event stream.
///
/// Only mutated through [`StateAggregate::on_sourcing`], one event at a time,
/// in strictly ascending version order. A state aggregate is owned by the call
/// that built it and never shared between concurrent reconstructions.
#[derive(Debug, Clone, PartialEq)]
pub struct StateAggregate<S> {
    aggregate_id: AggregateId,
    state: S,
    version: u64,
    event_id: Option<EventId>,
    first_operator: String,
    operator: String,
    first_event_time: Option<DateTime<Utc>>,
    event_time: Option<DateTime<Utc>>,
    deleted: bool,
}

impl<S: StateRoot> StateAggregate<S> {
    /// A not-yet-materialized aggregate (version 0, uninitialized).
    pub fn empty(aggregate_id: AggregateId, state: S) -> Self {
        Self {
            aggregate_id,
            state,
            version: 0,
            event_id: None,
            first_operator: String::new(),
            operator: String::new(),
            first_event_time: None,
            event_time: None,
            deleted: false,
        }
    }

    pub fn from_parts(parts: StateAggregateParts<S>) -> Self {
        Self {
            aggregate_id: parts.aggregate_id,
            state: parts.state,
            version: parts.version,
            event_id: parts.event_id,
            first_operator: parts.first_operator,
            operator: parts.operator,
            first_event_time: parts.first_event_time,
            event_time: parts.event_time,
            deleted: parts.deleted,
        }
    }

    pub fn into_parts(self) -> StateAggregateParts<S> {
        StateAggregateParts {
            aggregate_id: self.aggregate_id,
            state: self.state,
            version: self.version,
            event_id: self.event_id,
            first_operator: self.first_operator,
            operator: self.operator,
            first_event_time: self.first_event_time,
            event_time: self.event_time,
            deleted: self.deleted,
        }
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Version the next applied event must carry.
    pub fn expected_next_version(&self) -> u64 {
        self.version + 1
    }

    pub fn event_id(&self) -> Option<&EventId> {
        self.event_id.as_ref()
    }

    pub fn first_operator(&self) -> &str {
        &self.first_operator
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn first_event_time(&self) -> Option<DateTime<Utc>> {
        self.first_event_time
    }

    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        self.event_time
    }

    /// Whether at least one event has been applied.
    pub fn initialized(&self) -> bool {
        self.version > 0
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    /// Apply the next event of the stream.
    ///
    /// The event must belong to this aggregate (same id and tenant) and carry
    /// exactly [`expected_next_version`](Self::expected_next_version). On error
    /// the aggregate is left untouched.
    pub fn on_sourcing(&mut self, event: &DomainEvent) -> Result<(), SourcingError> {
        self.check_owner(event.aggregate_id())?;

        let expected = self.expected_next_version();
        if event.version() != expected {
            return Err(IntegrityError::NonContiguousVersion {
                aggregate_id: self.aggregate_id.clone(),
                expected,
                actual: event.version(),
            }
            .into());
        }

        let body: S::Event = event.decode_body().map_err(|source| SourcingError::Decode {
            name: event.name().to_string(),
            version: event.version(),
            source,
        })?;

        self.state.apply(&body);
        match S::lifecycle(&body) {
            Lifecycle::Deleted => self.deleted = true,
            Lifecycle::Recovered => self.deleted = false,
            Lifecycle::Unchanged => {}
        }

        let metadata = event.metadata();
        if expected == 1 {
            self.first_operator = metadata.operator.clone();
            self.first_event_time = Some(metadata.create_time);
        }
        self.version = expected;
        self.event_id = Some(event.id().clone());
        self.operator = metadata.operator.clone();
        self.event_time = Some(metadata.create_time);
        Ok(())
    }

    fn check_owner(&self, other: &AggregateId) -> Result<(), IntegrityError> {
        if other.tenant_id() != self.aggregate_id.tenant_id() {
            return Err(IntegrityError::TenantMismatch {
                aggregate_id: self.aggregate_id.clone(),
                expected: self.aggregate_id.tenant_id().clone(),
                actual: other.tenant_id().clone(),
            });
        }
        if other != &self.aggregate_id {
            return Err(IntegrityError::AggregateIdMismatch {
                expected: self.aggregate_id.to_string(),
                actual: other.to_string(),
            });
        }
        Ok(())
    }
}

/// Builds empty aggregates for ids that have no snapshot yet.
pub trait StateAggregateFactory: Send + Sync {
    fn create<S: StateRoot>(
        &self,
        metadata: &StateAggregateMetadata<S>,
        aggregate_id: &AggregateId,
    ) -> StateAggregate<S>;
}

/// Factory that uses the constructor registered in the metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstructorStateAggregateFactory;

impl StateAggregateFactory for ConstructorStateAggregateFactory {
    fn create<S: StateRoot>(
        &self,
        metadata: &StateAggregateMetadata<S>,
        aggregate_id: &AggregateId,
    ) -> StateAggregate<S> {
        StateAggregate::empty(aggregate_id.clone(), metadata.create_state(aggregate_id))
    }
}
