use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use replica_core::{AggregateId, CommandId, EventId, RequestId, TenantId};

/// A typed domain event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **named** (the name is persisted next to the body and drives decoding)
/// - designed to be **append-only**
pub trait Event: Serialize + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "order.created").
    fn event_name(&self) -> &'static str;
}

/// Who/what produced an event, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub operator: String,
    pub command_id: CommandId,
    pub request_id: RequestId,
    pub create_time: DateTime<Utc>,
}

impl EventMetadata {
    pub fn new(command_id: CommandId, request_id: RequestId) -> Self {
        Self {
            operator: String::new(),
            command_id,
            request_id,
            create_time: Utc::now(),
        }
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    pub fn with_create_time(mut self, create_time: DateTime<Utc>) -> Self {
        self.create_time = create_time;
        self
    }
}

/// A persisted event in one aggregate's stream.
///
/// Events of one aggregate form a strictly increasing, gapless sequence of
/// versions starting at 1. The body is kept as a JSON document; the state that
/// consumes it decodes it into its own event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    id: EventId,
    aggregate_id: AggregateId,
    version: u64,
    name: String,
    body: JsonValue,
    metadata: EventMetadata,
}

impl DomainEvent {
    pub fn new(
        id: EventId,
        aggregate_id: AggregateId,
        version: u64,
        name: impl Into<String>,
        body: JsonValue,
        metadata: EventMetadata,
    ) -> Self {
        Self {
            id,
            aggregate_id,
            version,
            name: name.into(),
            body,
            metadata,
        }
    }

    /// Build a domain event from a typed event, serializing its body.
    pub fn from_typed<E>(
        aggregate_id: AggregateId,
        version: u64,
        event: &E,
        metadata: EventMetadata,
    ) -> Result<Self, serde_json::Error>
    where
        E: Event,
    {
        let body = serde_json::to_value(event)?;
        Ok(Self::new(
            EventId::generate(),
            aggregate_id,
            version,
            event.event_name(),
            body,
            metadata,
        ))
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        self.aggregate_id.tenant_id()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &JsonValue {
        &self.body
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Decode the body into a typed event.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}
