use chrono::{DateTime, Utc};

use replica_core::{AggregateId, StateRoot};

use crate::state::StateAggregate;

/// A point-in-time copy of a materialized aggregate.
///
/// Snapshots are an acceleration structure, never the source of truth: they
/// always represent the latest known state, so they may only seed a replay
/// that targets the latest version.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<S> {
    delegate: StateAggregate<S>,
    snapshot_time: DateTime<Utc>,
}

impl<S: StateRoot> Snapshot<S> {
    pub fn new(delegate: StateAggregate<S>) -> Self {
        Self::with_snapshot_time(delegate, Utc::now())
    }

    pub fn with_snapshot_time(delegate: StateAggregate<S>, snapshot_time: DateTime<Utc>) -> Self {
        Self {
            delegate,
            snapshot_time,
        }
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        self.delegate.aggregate_id()
    }

    pub fn version(&self) -> u64 {
        self.delegate.version()
    }

    pub fn snapshot_time(&self) -> DateTime<Utc> {
        self.snapshot_time
    }

    pub fn state_aggregate(&self) -> &StateAggregate<S> {
        &self.delegate
    }

    pub fn into_state_aggregate(self) -> StateAggregate<S> {
        self.delegate
    }
}
