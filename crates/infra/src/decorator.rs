//! Delaying decorators for the storage traits.
//!
//! Used to simulate slow storage in tests and benchmarks. A decorator forwards
//! every call to its delegate unchanged and only adds latency before it.

use std::time::Duration;

use async_trait::async_trait;

use replica_core::{AggregateId, ExpectedVersion, NamedAggregate};
use replica_events::{DomainEvent, Snapshot};

use crate::config::DelayConfig;
use crate::event_store::{EventStore, EventStoreError};
use crate::snapshot::{InMemorySnapshotRepository, SnapshotError, SnapshotRepository, SnapshotState};

/// A wrapper exposing the instance it wraps.
pub trait Decorator {
    type Delegate;

    fn delegate(&self) -> &Self::Delegate;
}

/// Snapshot repository that sleeps before every call.
#[derive(Debug)]
pub struct DelaySnapshotRepository<R = InMemorySnapshotRepository> {
    delegate: R,
    config: DelayConfig,
}

impl Default for DelaySnapshotRepository {
    fn default() -> Self {
        Self::new(InMemorySnapshotRepository::new())
    }
}

impl<R> DelaySnapshotRepository<R> {
    pub fn new(delegate: R) -> Self {
        Self::with_config(delegate, DelayConfig::default())
    }

    pub fn with_config(delegate: R, config: DelayConfig) -> Self {
        Self { delegate, config }
    }

    pub fn delay(&self) -> Duration {
        self.config.delay
    }
}

impl<R> Decorator for DelaySnapshotRepository<R> {
    type Delegate = R;

    fn delegate(&self) -> &R {
        &self.delegate
    }
}

#[async_trait]
impl<R: SnapshotRepository> SnapshotRepository for DelaySnapshotRepository<R> {
    async fn load<S: SnapshotState>(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Option<Snapshot<S>>, SnapshotError> {
        tokio::time::sleep(self.config.delay).await;
        self.delegate.load(aggregate_id).await
    }

    async fn save<S: SnapshotState>(&self, snapshot: &Snapshot<S>) -> Result<(), SnapshotError> {
        tokio::time::sleep(self.config.delay).await;
        self.delegate.save(snapshot).await
    }
}

/// Event store that sleeps before every call.
#[derive(Debug)]
pub struct DelayEventStore<E> {
    delegate: E,
    config: DelayConfig,
}

impl<E> DelayEventStore<E> {
    pub fn new(delegate: E) -> Self {
        Self::with_config(delegate, DelayConfig::default())
    }

    pub fn with_config(delegate: E, config: DelayConfig) -> Self {
        Self { delegate, config }
    }

    pub fn delay(&self) -> Duration {
        self.config.delay
    }
}

impl<E> Decorator for DelayEventStore<E> {
    type Delegate = E;

    fn delegate(&self) -> &E {
        &self.delegate
    }
}

#[async_trait]
impl<E: EventStore> EventStore for DelayEventStore<E> {
    async fn append(
        &self,
        events: Vec<DomainEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        tokio::time::sleep(self.config.delay).await;
        self.delegate.append(events, expected_version).await
    }

    async fn load(
        &self,
        aggregate_id: &AggregateId,
        head_version: u64,
        tail_version: u64,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        tokio::time::sleep(self.config.delay).await;
        self.delegate
            .load(aggregate_id, head_version, tail_version)
            .await
    }

    async fn scan_aggregate_id(
        &self,
        named_aggregate: &NamedAggregate,
        cursor_id: &str,
        limit: usize,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        tokio::time::sleep(self.config.delay).await;
        self.delegate
            .scan_aggregate_id(named_aggregate, cursor_id, limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use replica_core::{TailVersion, TenantId};

    use super::*;
    use crate::event_store::InMemoryEventStore;

    #[tokio::test]
    async fn default_snapshot_decorator_wraps_in_memory_store() {
        let repo = DelaySnapshotRepository::default();
        assert_eq!(repo.delay(), Duration::from_millis(5));
        assert!(repo.delegate().is_empty());
    }

    #[tokio::test]
    async fn event_store_decorator_delays_and_forwards() {
        let store = DelayEventStore::with_config(
            InMemoryEventStore::new(),
            DelayConfig::default().with_delay(Duration::from_millis(20)),
        );
        let id = AggregateId::new("sales", "order", "A1", TenantId::default());

        let started = Instant::now();
        let events = store.load(&id, 1, TailVersion::LATEST).await.unwrap();

        assert!(events.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
