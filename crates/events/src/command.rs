use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use replica_core::{AggregateId, CommandId, RequestId, TenantId};

/// A typed command (intent to change one aggregate).
///
/// Commands represent **intent** - a request to perform an action on an aggregate.
/// They are turned into [`CommandMessage`]s before being handed to the command bus;
/// the processing pipeline behind the bus decides which events (if any) result.
///
/// Commands must be:
/// - **Serializable**: the body travels as a JSON document
/// - **Send + Sync**: commands cross task boundaries
/// - **'static**: commands don't contain borrowed data
pub trait Command: Serialize + core::fmt::Debug + Send + Sync + 'static {
    /// Stable command name (e.g. "order.create").
    fn command_name(&self) -> &'static str;
}

/// A command addressed to one aggregate, ready for dispatch.
///
/// Submitted once and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    command_id: CommandId,
    request_id: RequestId,
    aggregate_id: AggregateId,
    name: String,
    body: JsonValue,
    create_time: DateTime<Utc>,
}

impl CommandMessage {
    /// Build a message with a fresh command id; the request id defaults to the
    /// command id.
    pub fn new(aggregate_id: AggregateId, name: impl Into<String>, body: JsonValue) -> Self {
        let command_id = CommandId::generate();
        let request_id = RequestId::from(command_id.as_str());
        Self {
            command_id,
            request_id,
            aggregate_id,
            name: name.into(),
            body,
            create_time: Utc::now(),
        }
    }

    pub fn from_typed<C: Command>(
        aggregate_id: AggregateId,
        command: &C,
    ) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_value(command)?;
        Ok(Self::new(aggregate_id, command.command_name(), body))
    }

    /// Replace the command id.
    ///
    /// A request id still defaulted from the old command id follows the new
    /// one; an explicitly set request id is kept.
    pub fn with_command_id(mut self, command_id: CommandId) -> Self {
        if self.request_id.as_str() == self.command_id.as_str() {
            self.request_id = RequestId::from(command_id.as_str());
        }
        self.command_id = command_id;
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn command_id(&self) -> &CommandId {
        &self.command_id
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    pub fn context_name(&self) -> &str {
        self.aggregate_id.context_name()
    }

    pub fn tenant_id(&self) -> &TenantId {
        self.aggregate_id.tenant_id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &JsonValue {
        &self.body
    }

    pub fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize)]
    struct CreateOrder {
        sku: String,
    }

    impl Command for CreateOrder {
        fn command_name(&self) -> &'static str {
            "order.create"
        }
    }

    #[test]
    fn typed_command_becomes_message() {
        let id = AggregateId::new("order", "order", "A1", TenantId::from("T1"));
        let msg = CommandMessage::from_typed(
            id.clone(),
            &CreateOrder {
                sku: "sku-1".to_string(),
            },
        )
        .unwrap();

        assert_eq!(msg.name(), "order.create");
        assert_eq!(msg.context_name(), "order");
        assert_eq!(msg.aggregate_id(), &id);
        assert_eq!(msg.body()["sku"], "sku-1");
        assert_eq!(msg.request_id().as_str(), msg.command_id().as_str());
    }

    #[test]
    fn request_id_can_be_overridden() {
        let id = AggregateId::new("order", "order", "A1", TenantId::default());
        let msg = CommandMessage::new(id, "order.ping", JsonValue::Null)
            .with_request_id(RequestId::from("req-1"));
        assert_eq!(msg.request_id().as_str(), "req-1");
    }

    #[test]
    fn defaulted_request_id_follows_new_command_id() {
        let id = AggregateId::new("order", "order", "A1", TenantId::default());
        let msg = CommandMessage::new(id, "order.ping", JsonValue::Null)
            .with_command_id(CommandId::from("cmd-7"));
        assert_eq!(msg.command_id().as_str(), "cmd-7");
        assert_eq!(msg.request_id().as_str(), "cmd-7");
    }

    #[test]
    fn explicit_request_id_survives_new_command_id() {
        let id = AggregateId::new("order", "order", "A1", TenantId::default());
        let msg = CommandMessage::new(id, "order.ping", JsonValue::Null)
            .with_request_id(RequestId::from("req-1"))
            .with_command_id(CommandId::from("cmd-7"));
        assert_eq!(msg.command_id().as_str(), "cmd-7");
        assert_eq!(msg.request_id().as_str(), "req-1");
    }
}
