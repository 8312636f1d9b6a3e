//! `replica-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{ExpectedVersion, Lifecycle, StateRoot, TailVersion};
pub use error::{DomainError, IntegrityError};
pub use id::{AggregateId, CommandId, EventId, NamedAggregate, RequestId, TenantId};
