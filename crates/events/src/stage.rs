use core::str::FromStr;

use serde::{Deserialize, Serialize};

use replica_core::DomainError;

/// A checkpoint in asynchronous command processing that can be awaited.
///
/// Variants are ordered by when they occur in the pipeline. Reaching a later
/// stage says nothing about whether a waiter on an earlier stage was notified:
/// every stage is its own notification channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStage {
    /// Accepted by the command bus.
    Sent,
    /// Handled by the aggregate processor.
    Processed,
    /// Snapshot written.
    Snapshot,
    /// Read-model projection done.
    Projected,
    /// Event handlers done.
    EventHandled,
    /// Sagas done.
    SagaHandled,
}

impl CommandStage {
    pub const ALL: [CommandStage; 6] = [
        CommandStage::Sent,
        CommandStage::Processed,
        CommandStage::Snapshot,
        CommandStage::Projected,
        CommandStage::EventHandled,
        CommandStage::SagaHandled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandStage::Sent => "SENT",
            CommandStage::Processed => "PROCESSED",
            CommandStage::Snapshot => "SNAPSHOT",
            CommandStage::Projected => "PROJECTED",
            CommandStage::EventHandled => "EVENT_HANDLED",
            CommandStage::SagaHandled => "SAGA_HANDLED",
        }
    }
}

impl core::fmt::Display for CommandStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandStage {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandStage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::validation(format!("unknown command stage: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered_by_pipeline_occurrence() {
        assert!(CommandStage::Sent < CommandStage::Processed);
        assert!(CommandStage::Processed < CommandStage::Projected);
        assert_eq!(CommandStage::ALL.iter().max(), Some(&CommandStage::SagaHandled));
    }

    #[test]
    fn stage_names_parse_case_insensitively() {
        assert_eq!("processed".parse::<CommandStage>().unwrap(), CommandStage::Processed);
        assert_eq!("EVENT_HANDLED".parse::<CommandStage>().unwrap(), CommandStage::EventHandled);
        assert!("DONE".parse::<CommandStage>().is_err());
    }
}
