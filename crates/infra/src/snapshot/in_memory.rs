use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use replica_core::{AggregateId, NamedAggregate, TenantId};
use replica_events::Snapshot;

use super::record::SnapshotRecord;
use super::repository::{SnapshotError, SnapshotRepository, SnapshotState};

type SnapshotKey = (NamedAggregate, String, TenantId);

fn key_of(aggregate_id: &AggregateId) -> SnapshotKey {
    (
        aggregate_id.named_aggregate().clone(),
        aggregate_id.id().to_string(),
        aggregate_id.tenant_id().clone(),
    )
}

/// In-memory snapshot store for tests/dev.
///
/// Rows are keyed by aggregate type, id and tenant, so tenants sharing an id
/// never see each other's snapshots.
#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    records: RwLock<HashMap<SnapshotKey, SnapshotRecord>>,
}

impl InMemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw row under `aggregate_id`, bypassing encoding.
    ///
    /// The row's own id and tenant columns are not consulted, which lets
    /// tests plant a row that disagrees with the slot it sits in.
    pub fn put_record(
        &self,
        aggregate_id: &AggregateId,
        record: SnapshotRecord,
    ) -> Result<(), SnapshotError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| SnapshotError::Storage("lock poisoned".to_string()))?;
        records.insert(key_of(aggregate_id), record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn load<S: SnapshotState>(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Option<Snapshot<S>>, SnapshotError> {
        let record = {
            let records = self
                .records
                .read()
                .map_err(|_| SnapshotError::Storage("lock poisoned".to_string()))?;
            records.get(&key_of(aggregate_id)).cloned()
        };

        record
            .map(|record| record.into_snapshot(aggregate_id, None))
            .transpose()
    }

    async fn save<S: SnapshotState>(&self, snapshot: &Snapshot<S>) -> Result<(), SnapshotError> {
        let record = SnapshotRecord::from_snapshot(snapshot)?;
        self.put_record(snapshot.aggregate_id(), record)
    }
}
