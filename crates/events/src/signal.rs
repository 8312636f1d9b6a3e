use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use replica_core::CommandId;

use crate::command::CommandMessage;
use crate::error_info::{ErrorInfo, codes};
use crate::result::CommandResult;
use crate::stage::CommandStage;

/// Notification that `stage` has completed for `command_id`.
///
/// Emitted by the processing pipeline (or by the gateway itself for
/// [`CommandStage::Sent`]) and translated into a [`CommandResult`] by the waiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitSignal {
    pub command_id: CommandId,
    pub stage: CommandStage,
    pub context_name: String,
    pub processor_name: String,
    pub error_code: String,
    pub error_msg: String,
    #[serde(default)]
    pub result: Map<String, JsonValue>,
}

impl WaitSignal {
    pub fn succeeded(
        command_id: CommandId,
        stage: CommandStage,
        context_name: impl Into<String>,
        processor_name: impl Into<String>,
    ) -> Self {
        Self {
            command_id,
            stage,
            context_name: context_name.into(),
            processor_name: processor_name.into(),
            error_code: codes::SUCCEEDED.to_string(),
            error_msg: String::new(),
            result: Map::new(),
        }
    }

    pub fn failed(
        command_id: CommandId,
        stage: CommandStage,
        context_name: impl Into<String>,
        processor_name: impl Into<String>,
        error_code: impl Into<String>,
        error_msg: impl Into<String>,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            error_msg: error_msg.into(),
            ..Self::succeeded(command_id, stage, context_name, processor_name)
        }
    }

    pub fn with_result(mut self, result: Map<String, JsonValue>) -> Self {
        self.result = result;
        self
    }

    /// Translate the signal into the result of `command`.
    pub fn to_result(&self, command: &CommandMessage) -> CommandResult {
        let mut result = CommandResult::from_error(self, command, self.stage, &self.processor_name);
        result.context_name = self.context_name.clone();
        result.result = self.result.clone();
        result
    }
}

impl ErrorInfo for WaitSignal {
    fn error_code(&self) -> &str {
        &self.error_code
    }

    fn error_msg(&self) -> String {
        self.error_msg.clone()
    }
}
