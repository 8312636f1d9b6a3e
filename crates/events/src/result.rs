//! Uniform command outcome.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::command::CommandMessage;
use crate::error_info::{ErrorInfo, codes};
use crate::stage::CommandStage;

/// Outcome of a command at a given stage.
///
/// Success and failure share this one shape; the disposition is carried by
/// `succeeded` (and `error_code`), never by a distinct type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub stage: CommandStage,
    pub aggregate_id: String,
    pub context_name: String,
    pub processor_name: String,
    pub tenant_id: String,
    pub request_id: String,
    pub command_id: String,
    pub succeeded: bool,
    pub error_code: String,
    pub error_msg: String,
    #[serde(default)]
    pub result: Map<String, JsonValue>,
}

impl CommandResult {
    /// A successful result for `command` at `stage`.
    pub fn succeeded(
        command: &CommandMessage,
        stage: CommandStage,
        processor_name: impl Into<String>,
    ) -> Self {
        Self::build(command, stage, processor_name.into(), codes::SUCCEEDED, String::new())
    }

    /// A failed result for `command`, built from any reportable error.
    pub fn from_error<E>(
        error: &E,
        command: &CommandMessage,
        stage: CommandStage,
        processor_name: impl Into<String>,
    ) -> Self
    where
        E: ErrorInfo + ?Sized,
    {
        Self::build(
            command,
            stage,
            processor_name.into(),
            error.error_code(),
            error.error_msg(),
        )
    }

    fn build(
        command: &CommandMessage,
        stage: CommandStage,
        processor_name: String,
        error_code: &str,
        error_msg: String,
    ) -> Self {
        Self {
            stage,
            aggregate_id: command.aggregate_id().id().to_string(),
            context_name: command.context_name().to_string(),
            processor_name,
            tenant_id: command.tenant_id().to_string(),
            request_id: command.request_id().to_string(),
            command_id: command.command_id().to_string(),
            succeeded: error_code == codes::SUCCEEDED,
            error_code: error_code.to_string(),
            error_msg,
            result: Map::new(),
        }
    }
}

impl ErrorInfo for CommandResult {
    fn error_code(&self) -> &str {
        &self.error_code
    }

    fn error_msg(&self) -> String {
        self.error_msg.clone()
    }

    fn succeeded(&self) -> bool {
        self.succeeded
    }
}

/// A failed [`CommandResult`] surfaced as an error.
///
/// The payload is the only way to tell "dispatch failed" from "processing
/// failed" from "timed out": inspect `error_code` and `stage`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "command [{}] failed at stage {}: [{}] {}",
    .0.command_id,
    .0.stage,
    .0.error_code,
    .0.error_msg
)]
pub struct CommandResultError(pub CommandResult);

impl CommandResultError {
    pub fn result(&self) -> &CommandResult {
        &self.0
    }

    pub fn into_result(self) -> CommandResult {
        self.0
    }
}

impl ErrorInfo for CommandResultError {
    fn error_code(&self) -> &str {
        &self.0.error_code
    }

    fn error_msg(&self) -> String {
        self.0.error_msg.clone()
    }
}

#[cfg(test)]
mod tests {
    use replica_core::{AggregateId, TenantId};

    use super::*;

    struct Rejected;

    impl ErrorInfo for Rejected {
        fn error_code(&self) -> &str {
            codes::BAD_REQUEST
        }

        fn error_msg(&self) -> String {
            "rejected".to_string()
        }
    }

    fn command() -> CommandMessage {
        let id = AggregateId::new("order", "order", "A1", TenantId::from("T1"));
        CommandMessage::new(id, "order.create", JsonValue::Null)
    }

    #[test]
    fn succeeded_result_copies_command_identity() {
        let cmd = command();
        let result = CommandResult::succeeded(&cmd, CommandStage::Sent, "CommandGateway");

        assert!(result.succeeded);
        assert_eq!(result.error_code, codes::SUCCEEDED);
        assert_eq!(result.aggregate_id, "A1");
        assert_eq!(result.context_name, "order");
        assert_eq!(result.tenant_id, "T1");
        assert_eq!(result.command_id, cmd.command_id().as_str());
    }

    #[test]
    fn error_becomes_failed_result() {
        let result =
            CommandResult::from_error(&Rejected, &command(), CommandStage::Sent, "CommandGateway");
        assert!(!result.succeeded);
        assert_eq!(result.error_code, "BadRequest");
        assert_eq!(result.error_msg, "rejected");
    }

    #[test]
    fn result_error_displays_code() {
        let result =
            CommandResult::from_error(&Rejected, &command(), CommandStage::Processed, "p");
        let err = CommandResultError(result);
        let text = err.to_string();
        assert!(text.contains("PROCESSED"));
        assert!(text.contains("BadRequest"));
    }
}
