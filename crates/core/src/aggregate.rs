//! Aggregate state abstractions for event-sourced domain models.

use serde::de::DeserializeOwned;

/// Optimistic concurrency expectation for an aggregate stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (useful for idempotent commands, migrations, etc.).
    Any,
    /// Require the stream to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}

/// Upper bound of a replay.
///
/// `Latest` means "as of now" and is the only case in which a cached snapshot
/// may serve as the starting point. `Exact(v)` reconstructs the state as it was
/// right after version `v`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TailVersion {
    Latest,
    Exact(u64),
}

impl TailVersion {
    /// Sentinel used when talking to stores that take a numeric ceiling.
    pub const LATEST: u64 = u64::MAX;

    pub fn is_latest(self) -> bool {
        matches!(self, TailVersion::Latest)
    }

    pub fn as_u64(self) -> u64 {
        match self {
            TailVersion::Latest => Self::LATEST,
            TailVersion::Exact(v) => v,
        }
    }
}

impl From<u64> for TailVersion {
    fn from(value: u64) -> Self {
        if value == Self::LATEST {
            TailVersion::Latest
        } else {
            TailVersion::Exact(value)
        }
    }
}

/// Effect an event has on the aggregate's lifecycle flags.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Unchanged,
    Deleted,
    Recovered,
}

/// Domain state of an event-sourced aggregate.
///
/// - **State mutation**: `apply(&mut self, event)` evolves state.
///
/// Implementations must not perform IO or side effects, and must be
/// deterministic: replaying the same events always yields the same state.
pub trait StateRoot: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Events this state understands, decoded from persisted event bodies.
    type Event: DeserializeOwned;

    /// Evolve in-memory state from a single event.
    fn apply(&mut self, event: &Self::Event);

    /// Whether the event deletes or recovers the aggregate.
    fn lifecycle(_event: &Self::Event) -> Lifecycle {
        Lifecycle::Unchanged
    }

    /// Name recorded alongside persisted copies of this state.
    fn state_type() -> &'static str {
        core::any::type_name::<Self>()
    }
}
