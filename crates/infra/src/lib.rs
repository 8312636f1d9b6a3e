//! Infrastructure layer: event and snapshot storage, aggregate reconstruction,
//! and the command gateway.

pub mod config;
pub mod decorator;
pub mod event_store;
pub mod gateway;
pub mod history;
pub mod repository;
pub mod scan;
pub mod snapshot;
pub mod wait;


pub use config::{DelayConfig, GatewayConfig};
pub use decorator::{Decorator, DelayEventStore, DelaySnapshotRepository};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore};
pub use gateway::{
    COMMAND_GATEWAY_PROCESSOR_NAME, ClientCommandExchange, CommandGateway, DefaultCommandGateway,
    GatewayError,
};
pub use history::StateTracer;
pub use repository::{EventSourcingStateAggregateRepository, LoadError, StateAggregateRepository};
pub use scan::AggregateScanner;
pub use snapshot::{
    InMemorySnapshotRepository, PostgresSnapshotRepository, SnapshotError, SnapshotRecord,
    SnapshotRepository, SnapshotState,
};
pub use wait::{
    CommandWaitNotifier, LocalCommandWaitNotifier, WaitError, WaitStrategyRegistrar, WaitingFor,
};
