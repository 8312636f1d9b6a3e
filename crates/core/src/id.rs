//! Strongly-typed identifiers used across the workspace.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a tenant (multi-tenant boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

/// Identifier of a submitted command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

/// Identifier of a client request (may span several commands).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

/// Identifier of a persisted domain event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Generate a fresh identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.trim().is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: must not be blank", $name)));
                }
                Ok(Self(s.to_string()))
            }
        }
    };
}

impl_string_newtype!(TenantId, "TenantId");
impl_string_newtype!(CommandId, "CommandId");
impl_string_newtype!(RequestId, "RequestId");
impl_string_newtype!(EventId, "EventId");

impl TenantId {
    /// Tenant used when the deployment is not multi-tenant.
    pub const DEFAULT: &'static str = "(0)";

    pub fn default_tenant() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::default_tenant()
    }
}

/// An aggregate type within a bounded context (e.g. `order` in `sales-service`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedAggregate {
    context_name: String,
    aggregate_name: String,
}

impl NamedAggregate {
    pub fn new(context_name: impl Into<String>, aggregate_name: impl Into<String>) -> Self {
        Self {
            context_name: context_name.into(),
            aggregate_name: aggregate_name.into(),
        }
    }

    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    pub fn aggregate_name(&self) -> &str {
        &self.aggregate_name
    }

    /// Build the id of one instance of this aggregate type.
    pub fn aggregate_id(&self, id: impl Into<String>, tenant_id: TenantId) -> AggregateId {
        AggregateId {
            named_aggregate: self.clone(),
            id: id.into(),
            tenant_id,
        }
    }
}

impl core::fmt::Display for NamedAggregate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.context_name, self.aggregate_name)
    }
}

/// Identifier of one aggregate instance within a bounded context and tenant.
///
/// Used as the key of both the event store and the snapshot repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateId {
    named_aggregate: NamedAggregate,
    id: String,
    tenant_id: TenantId,
}

impl AggregateId {
    pub fn new(
        context_name: impl Into<String>,
        aggregate_name: impl Into<String>,
        id: impl Into<String>,
        tenant_id: TenantId,
    ) -> Self {
        NamedAggregate::new(context_name, aggregate_name).aggregate_id(id, tenant_id)
    }

    pub fn named_aggregate(&self) -> &NamedAggregate {
        &self.named_aggregate
    }

    pub fn context_name(&self) -> &str {
        self.named_aggregate.context_name()
    }

    pub fn aggregate_name(&self) -> &str {
        self.named_aggregate.aggregate_name()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

impl core::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}@{}", self.named_aggregate, self.id, self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_non_blank() {
        let a = CommandId::generate();
        let b = CommandId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn blank_ids_are_rejected() {
        let err = "  ".parse::<RequestId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }

    #[test]
    fn default_tenant_is_the_zero_tenant() {
        let tenant = TenantId::default();
        assert_eq!(tenant.as_str(), "(0)");
        assert!(tenant.is_default());
    }

    #[test]
    fn aggregate_ids_differ_by_tenant() {
        let order = NamedAggregate::new("order", "order");
        let a = order.aggregate_id("A1", TenantId::from("T1"));
        let b = order.aggregate_id("A1", TenantId::from("T2"));
        assert_ne!(a, b);
        assert_eq!(a.context_name(), "order");
        assert_eq!(a.to_string(), "order.order.A1@T1");
    }
}
