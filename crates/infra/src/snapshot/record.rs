//! Persisted form of a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use replica_core::{AggregateId, EventId, IntegrityError};
use replica_events::{Snapshot, StateAggregate, StateAggregateParts};

use super::repository::{SnapshotError, SnapshotState};

/// One snapshot row.
///
/// Times are epoch milliseconds. Optional text columns may be absent (read as
/// empty), optional time columns may be absent (read as 0, meaning "no event").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub aggregate_id: String,
    pub tenant_id: String,
    pub version: u64,
    pub state_type: String,
    pub state: String,
    pub event_id: Option<String>,
    pub first_operator: Option<String>,
    pub operator: Option<String>,
    pub first_event_time: Option<i64>,
    pub event_time: Option<i64>,
    pub snapshot_time: i64,
    pub deleted: bool,
}

impl SnapshotRecord {
    pub fn from_snapshot<S: SnapshotState>(snapshot: &Snapshot<S>) -> Result<Self, SnapshotError> {
        let aggregate = snapshot.state_aggregate();
        let state = serde_json::to_string(aggregate.state()).map_err(|source| {
            SnapshotError::Encode {
                aggregate_id: aggregate.aggregate_id().clone(),
                source,
            }
        })?;

        Ok(Self {
            aggregate_id: aggregate.aggregate_id().id().to_string(),
            tenant_id: aggregate.aggregate_id().tenant_id().to_string(),
            version: aggregate.version(),
            state_type: S::state_type().to_string(),
            state,
            event_id: aggregate.event_id().map(ToString::to_string),
            first_operator: Some(aggregate.first_operator().to_string()),
            operator: Some(aggregate.operator().to_string()),
            first_event_time: Some(to_millis(aggregate.first_event_time())),
            event_time: Some(to_millis(aggregate.event_time())),
            snapshot_time: snapshot.snapshot_time().timestamp_millis(),
            deleted: aggregate.deleted(),
        })
    }

    /// Decode the row as the snapshot of `aggregate_id`.
    ///
    /// The row must belong to `aggregate_id` (same id and tenant), hold a
    /// state of type `S`, and carry `expected_version` when one is given.
    pub fn into_snapshot<S: SnapshotState>(
        self,
        aggregate_id: &AggregateId,
        expected_version: Option<u64>,
    ) -> Result<Snapshot<S>, SnapshotError> {
        if self.aggregate_id != aggregate_id.id() {
            return Err(IntegrityError::AggregateIdMismatch {
                expected: aggregate_id.id().to_string(),
                actual: self.aggregate_id,
            }
            .into());
        }
        if self.tenant_id != aggregate_id.tenant_id().as_str() {
            return Err(IntegrityError::TenantMismatch {
                aggregate_id: aggregate_id.clone(),
                expected: aggregate_id.tenant_id().clone(),
                actual: self.tenant_id.into(),
            }
            .into());
        }
        if let Some(expected) = expected_version {
            if self.version != expected {
                return Err(IntegrityError::VersionMismatch {
                    aggregate_id: aggregate_id.clone(),
                    expected,
                    actual: self.version,
                }
                .into());
            }
        }
        if self.state_type != S::state_type() {
            return Err(IntegrityError::StateTypeMismatch {
                aggregate_id: aggregate_id.clone(),
                expected: S::state_type().to_string(),
                actual: self.state_type,
            }
            .into());
        }

        let state: S =
            serde_json::from_str(&self.state).map_err(|source| SnapshotError::Decode {
                aggregate_id: aggregate_id.clone(),
                source,
            })?;

        let delegate = StateAggregate::from_parts(StateAggregateParts {
            aggregate_id: aggregate_id.clone(),
            state,
            version: self.version,
            event_id: self
                .event_id
                .filter(|id| !id.is_empty())
                .map(EventId::from),
            first_operator: self.first_operator.unwrap_or_default(),
            operator: self.operator.unwrap_or_default(),
            first_event_time: from_millis("first_event_time", self.first_event_time.unwrap_or(0))?,
            event_time: from_millis("event_time", self.event_time.unwrap_or(0))?,
            deleted: self.deleted,
        });
        let snapshot_time = from_millis("snapshot_time", self.snapshot_time)?.ok_or(
            SnapshotError::InvalidTimestamp {
                column: "snapshot_time",
                value: self.snapshot_time,
            },
        )?;

        Ok(Snapshot::with_snapshot_time(delegate, snapshot_time))
    }
}

fn to_millis(time: Option<DateTime<Utc>>) -> i64 {
    time.map(|t| t.timestamp_millis()).unwrap_or(0)
}

fn from_millis(column: &'static str, value: i64) -> Result<Option<DateTime<Utc>>, SnapshotError> {
    if value == 0 {
        return Ok(None);
    }
    DateTime::from_timestamp_millis(value)
        .map(Some)
        .ok_or(SnapshotError::InvalidTimestamp { column, value })
}

#[cfg(test)]
mod tests {
    use replica_core::{Lifecycle, TenantId};

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Cart {
        items: Vec<String>,
    }

    impl replica_core::StateRoot for Cart {
        type Event = String;

        fn apply(&mut self, event: &Self::Event) {
            self.items.push(event.clone());
        }

        fn lifecycle(_event: &Self::Event) -> Lifecycle {
            Lifecycle::Unchanged
        }
    }

    fn cart_id(tenant: &str) -> AggregateId {
        AggregateId::new("shop", "cart", "C1", TenantId::from(tenant))
    }

    fn snapshot() -> Snapshot<Cart> {
        let delegate = StateAggregate::from_parts(StateAggregateParts {
            aggregate_id: cart_id("T1"),
            state: Cart {
                items: vec!["apple".to_string()],
            },
            version: 4,
            event_id: Some(EventId::from("e-4")),
            first_operator: "alice".to_string(),
            operator: "bob".to_string(),
            first_event_time: DateTime::from_timestamp_millis(1_000),
            event_time: DateTime::from_timestamp_millis(4_000),
            deleted: false,
        });
        Snapshot::with_snapshot_time(delegate, DateTime::from_timestamp_millis(5_000).unwrap())
    }

    #[test]
    fn record_carries_every_column() {
        let record = SnapshotRecord::from_snapshot(&snapshot()).unwrap();
        assert_eq!(record.aggregate_id, "C1");
        assert_eq!(record.tenant_id, "T1");
        assert_eq!(record.version, 4);
        assert!(record.state_type.ends_with("Cart"));
        assert_eq!(record.event_id.as_deref(), Some("e-4"));
        assert_eq!(record.first_event_time, Some(1_000));
        assert_eq!(record.snapshot_time, 5_000);

        let restored: Snapshot<Cart> = record.into_snapshot(&cart_id("T1"), Some(4)).unwrap();
        assert_eq!(restored, snapshot());
    }

    #[test]
    fn foreign_tenant_row_is_an_integrity_error() {
        let record = SnapshotRecord::from_snapshot(&snapshot()).unwrap();
        let err = record
            .into_snapshot::<Cart>(&cart_id("T2"), None)
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Integrity(IntegrityError::TenantMismatch { .. })
        ));
    }

    #[test]
    fn unexpected_version_is_an_integrity_error() {
        let record = SnapshotRecord::from_snapshot(&snapshot()).unwrap();
        let err = record
            .into_snapshot::<Cart>(&cart_id("T1"), Some(3))
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Integrity(IntegrityError::VersionMismatch {
                expected: 3,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn row_of_another_state_type_is_rejected_before_decoding() {
        let mut record = SnapshotRecord::from_snapshot(&snapshot()).unwrap();
        // Body still decodes as a Cart; only the type column disagrees.
        record.state_type = "shop::Basket".to_string();

        let err = record
            .into_snapshot::<Cart>(&cart_id("T1"), None)
            .unwrap_err();
        match err {
            SnapshotError::Integrity(IntegrityError::StateTypeMismatch {
                expected, actual, ..
            }) => {
                assert!(expected.ends_with("Cart"));
                assert_eq!(actual, "shop::Basket");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_optional_columns_read_as_empty() {
        let mut record = SnapshotRecord::from_snapshot(&snapshot()).unwrap();
        record.event_id = None;
        record.first_operator = None;
        record.operator = None;
        record.first_event_time = None;
        record.event_time = None;

        let restored: Snapshot<Cart> = record.into_snapshot(&cart_id("T1"), None).unwrap();
        let aggregate = restored.state_aggregate();
        assert_eq!(aggregate.event_id(), None);
        assert_eq!(aggregate.first_operator(), "");
        assert_eq!(aggregate.operator(), "");
        assert_eq!(aggregate.event_time(), None);
        assert_eq!(aggregate.version(), 4);
    }
}
