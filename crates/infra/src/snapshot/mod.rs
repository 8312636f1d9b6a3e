//! Snapshot storage.
//!
//! Snapshots cache the latest materialized state of an aggregate so a
//! reconstruction only has to replay the events written since. They are never
//! the source of truth.

pub mod in_memory;
pub mod postgres;
pub mod record;
pub mod repository;

pub use in_memory::InMemorySnapshotRepository;
pub use postgres::{PostgresSnapshotRepository, SnapshotSchema};
pub use record::SnapshotRecord;
pub use repository::{SnapshotError, SnapshotRepository, SnapshotState};
