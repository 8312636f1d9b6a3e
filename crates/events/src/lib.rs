//! Events, state aggregates and command messaging.
//!
//! This crate holds the message-level vocabulary shared by the store, the
//! repository and the command gateway:
//!
//! - [`DomainEvent`]: a persisted state change of one aggregate
//! - [`StateAggregate`]: an aggregate's state plus its event-derived metadata
//! - [`Snapshot`]: a captured `StateAggregate` with its capture time
//! - [`CommandMessage`], [`CommandBus`]: command transport
//! - [`CommandStage`], [`WaitSignal`], [`CommandResult`]: command outcome reporting
//!
//! Nothing here performs IO; storage lives in `replica-infra`.

pub mod bus;
pub mod command;
pub mod error_info;
pub mod event;
pub mod in_memory_bus;
pub mod result;
pub mod signal;
pub mod snapshot;
pub mod stage;
pub mod state;

pub use bus::{CommandBus, CommandBusError, Subscription};
pub use command::{Command, CommandMessage};
pub use error_info::{ErrorInfo, codes};
pub use event::{DomainEvent, Event, EventMetadata};
pub use in_memory_bus::InMemoryCommandBus;
pub use result::{CommandResult, CommandResultError};
pub use signal::WaitSignal;
pub use snapshot::Snapshot;
pub use stage::CommandStage;
pub use state::{
    ConstructorStateAggregateFactory, SourcingError, StateAggregate, StateAggregateFactory,
    StateAggregateMetadata, StateAggregateParts,
};
