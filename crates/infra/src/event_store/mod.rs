//! Append-only event store boundary.
//!
//! An infrastructure-facing abstraction for storing and loading tenant-scoped
//! event streams without making any storage assumptions.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::{EventSchema, PostgresEventStore};
pub use r#trait::{DEFAULT_CURSOR_ID, EventStore, EventStoreError};
