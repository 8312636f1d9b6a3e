use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use replica_core::{AggregateId, ExpectedVersion, NamedAggregate};
use replica_events::DomainEvent;

use super::r#trait::{EventStore, EventStoreError, validate_batch};

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AggregateId, Vec<DomainEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[DomainEvent]) -> u64 {
        stream.last().map(|e| e.version()).unwrap_or(0)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        events: Vec<DomainEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };
        let key = first.aggregate_id().clone();

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;

        let current = streams
            .get(&key)
            .map(|stream| Self::current_version(stream))
            .unwrap_or(0);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }
        validate_batch(&events, current)?;

        streams.entry(key).or_default().extend(events.iter().cloned());
        Ok(events)
    }

    async fn load(
        &self,
        aggregate_id: &AggregateId,
        head_version: u64,
        tail_version: u64,
    ) -> Result<Vec<DomainEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;

        Ok(streams
            .get(aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| (head_version..=tail_version).contains(&e.version()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scan_aggregate_id(
        &self,
        named_aggregate: &NamedAggregate,
        cursor_id: &str,
        limit: usize,
    ) -> Result<Vec<AggregateId>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;

        let mut ids: Vec<AggregateId> = streams
            .keys()
            .filter(|id| id.named_aggregate() == named_aggregate && id.id() > cursor_id)
            .cloned()
            .collect();
        ids.sort_by(|a, b| {
            a.id()
                .cmp(b.id())
                .then_with(|| a.tenant_id().cmp(b.tenant_id()))
        });
        ids.truncate(limit);
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use replica_core::{CommandId, RequestId, TailVersion, TenantId};
    use replica_events::EventMetadata;
    use serde_json::json;

    use super::*;
    use crate::event_store::DEFAULT_CURSOR_ID;

    fn order(id: &str) -> AggregateId {
        AggregateId::new("sales", "order", id, TenantId::from("T1"))
    }

    fn event(aggregate_id: &AggregateId, version: u64) -> DomainEvent {
        DomainEvent::new(
            replica_core::EventId::generate(),
            aggregate_id.clone(),
            version,
            "order.touched",
            json!({ "n": version }),
            EventMetadata::new(CommandId::generate(), RequestId::generate()),
        )
    }

    #[tokio::test]
    async fn append_then_load_range() {
        let store = InMemoryEventStore::new();
        let id = order("A1");
        store
            .append(
                vec![event(&id, 1), event(&id, 2), event(&id, 3)],
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap();

        let all = store.load(&id, 1, TailVersion::LATEST).await.unwrap();
        assert_eq!(all.iter().map(|e| e.version()).collect::<Vec<_>>(), [1, 2, 3]);

        let tail = store.load(&id, 2, 2).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].version(), 2);

        assert!(store.load(&id, 4, TailVersion::LATEST).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_expected_version_is_a_conflict() {
        let store = InMemoryEventStore::new();
        let id = order("A1");
        store
            .append(vec![event(&id, 1)], ExpectedVersion::Exact(0))
            .await
            .unwrap();

        let err = store
            .append(vec![event(&id, 2)], ExpectedVersion::Exact(0))
            .await
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[tokio::test]
    async fn gaps_are_rejected_atomically() {
        let store = InMemoryEventStore::new();
        let id = order("A1");

        let err = store
            .append(vec![event(&id, 1), event(&id, 3)], ExpectedVersion::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));
        assert!(store.load(&id, 1, TailVersion::LATEST).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tenants_have_separate_streams() {
        let store = InMemoryEventStore::new();
        let t1 = order("A1");
        let t2 = AggregateId::new("sales", "order", "A1", TenantId::from("T2"));
        store
            .append(vec![event(&t1, 1)], ExpectedVersion::Any)
            .await
            .unwrap();

        assert!(store.load(&t2, 1, TailVersion::LATEST).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_pages_by_cursor() {
        let store = InMemoryEventStore::new();
        for id in ["c", "a", "b"] {
            let id = order(id);
            store
                .append(vec![event(&id, 1)], ExpectedVersion::Any)
                .await
                .unwrap();
        }
        let named = NamedAggregate::new("sales", "order");

        let first = store
            .scan_aggregate_id(&named, DEFAULT_CURSOR_ID, 2)
            .await
            .unwrap();
        assert_eq!(first.iter().map(|id| id.id()).collect::<Vec<_>>(), ["a", "b"]);

        let rest = store.scan_aggregate_id(&named, "b", 2).await.unwrap();
        assert_eq!(rest.iter().map(|id| id.id()).collect::<Vec<_>>(), ["c"]);

        let other = NamedAggregate::new("sales", "invoice");
        assert!(store
            .scan_aggregate_id(&other, DEFAULT_CURSOR_ID, 10)
            .await
            .unwrap()
            .is_empty());
    }
}
