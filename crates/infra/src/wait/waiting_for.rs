use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use replica_events::{CommandStage, ErrorInfo, WaitSignal, codes};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("timed out after {timeout:?} waiting for stage {stage}")]
    Timeout { stage: CommandStage, timeout: Duration },

    #[error("wait strategy for stage {stage} was dropped before it was signalled")]
    Closed { stage: CommandStage },

    #[error("wait strategy for stage {stage} is already being awaited")]
    AlreadyWaiting { stage: CommandStage },
}

impl ErrorInfo for WaitError {
    fn error_code(&self) -> &str {
        match self {
            WaitError::Timeout { .. } => codes::REQUEST_TIMEOUT,
            WaitError::Closed { .. } | WaitError::AlreadyWaiting { .. } => codes::ILLEGAL_STATE,
        }
    }

    fn error_msg(&self) -> String {
        self.to_string()
    }
}

/// Wait strategy: resolves on the first signal for one stage of one context.
///
/// Signals for any other stage or context are ignored, whatever their outcome.
/// Later signals after the first accepted one are ignored too.
#[derive(Debug)]
pub struct WaitingFor {
    stage: CommandStage,
    context_name: String,
    timeout: Option<Duration>,
    sender: Mutex<Option<oneshot::Sender<WaitSignal>>>,
    receiver: Mutex<Option<oneshot::Receiver<WaitSignal>>>,
}

impl WaitingFor {
    pub fn stage(stage: CommandStage, context_name: impl Into<String>) -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            stage,
            context_name: context_name.into(),
            timeout: None,
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
        }
    }

    pub fn sent(context_name: impl Into<String>) -> Self {
        Self::stage(CommandStage::Sent, context_name)
    }

    pub fn processed(context_name: impl Into<String>) -> Self {
        Self::stage(CommandStage::Processed, context_name)
    }

    pub fn snapshot(context_name: impl Into<String>) -> Self {
        Self::stage(CommandStage::Snapshot, context_name)
    }

    pub fn projected(context_name: impl Into<String>) -> Self {
        Self::stage(CommandStage::Projected, context_name)
    }

    pub fn event_handled(context_name: impl Into<String>) -> Self {
        Self::stage(CommandStage::EventHandled, context_name)
    }

    pub fn saga_handled(context_name: impl Into<String>) -> Self {
        Self::stage(CommandStage::SagaHandled, context_name)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn waited_stage(&self) -> CommandStage {
        self.stage
    }

    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether `signal` is the one this strategy waits for.
    pub fn matches(&self, signal: &WaitSignal) -> bool {
        signal.stage == self.stage && signal.context_name == self.context_name
    }

    /// Offer a signal. Returns `true` if it resolved this strategy.
    pub fn next(&self, signal: WaitSignal) -> bool {
        if !self.matches(&signal) {
            return false;
        }
        let sender = match self.sender.lock() {
            Ok(mut sender) => sender.take(),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(signal).is_ok(),
            None => false,
        }
    }

    /// Whether a matching signal has already been accepted.
    pub fn is_completed(&self) -> bool {
        self.sender.lock().map(|s| s.is_none()).unwrap_or(true)
    }

    /// Wait for the signal, bounded by this strategy's own timeout (if any).
    pub async fn waiting(&self) -> Result<WaitSignal, WaitError> {
        self.waiting_within(self.timeout).await
    }

    /// Wait for the signal, bounded by `timeout` (`None` waits forever).
    ///
    /// A strategy can be awaited once.
    pub async fn waiting_within(&self, timeout: Option<Duration>) -> Result<WaitSignal, WaitError> {
        let receiver = match self.receiver.lock() {
            Ok(mut receiver) => receiver.take(),
            Err(_) => None,
        };
        let Some(receiver) = receiver else {
            return Err(WaitError::AlreadyWaiting { stage: self.stage });
        };

        let closed = WaitError::Closed { stage: self.stage };
        match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, receiver).await {
                Ok(received) => received.map_err(|_| closed),
                Err(_) => Err(WaitError::Timeout {
                    stage: self.stage,
                    timeout,
                }),
            },
            None => receiver.await.map_err(|_| closed),
        }
    }
}
