//! Domain error model.

use thiserror::Error;

use crate::id::{AggregateId, TenantId};

/// Domain-level error.
///
/// Deterministic failures parsing or validating domain values. Infrastructure
/// concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Storage integrity violation.
///
/// Raised when persisted data disagrees with what the reader asked for: a row
/// belonging to another tenant, aggregate or state type, a version that is not
/// the expected one, or a gap in an event stream. These indicate corruption or adapter
/// misuse and are never retried or masked.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error(
        "the aggregate tenantId[{expected}] does not match the tenantId[{actual}] stored for {aggregate_id}"
    )]
    TenantMismatch {
        aggregate_id: AggregateId,
        expected: TenantId,
        actual: TenantId,
    },

    #[error("aggregate id mismatch: expected [{expected}], found [{actual}]")]
    AggregateIdMismatch { expected: String, actual: String },

    #[error("state type mismatch for {aggregate_id}: expected [{expected}], found [{actual}]")]
    StateTypeMismatch {
        aggregate_id: AggregateId,
        expected: String,
        actual: String,
    },

    #[error("version mismatch for {aggregate_id}: expected {expected}, found {actual}")]
    VersionMismatch {
        aggregate_id: AggregateId,
        expected: u64,
        actual: u64,
    },

    #[error(
        "non-contiguous event version for {aggregate_id}: expected {expected}, found {actual}"
    )]
    NonContiguousVersion {
        aggregate_id: AggregateId,
        expected: u64,
        actual: u64,
    },

    #[error("event version {actual} of {aggregate_id} is beyond the requested tail version {tail}")]
    BeyondTailVersion {
        aggregate_id: AggregateId,
        tail: u64,
        actual: u64,
    },
}
