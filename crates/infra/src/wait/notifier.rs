use std::sync::Arc;

use async_trait::async_trait;

use replica_events::WaitSignal;

use super::registrar::WaitStrategyRegistrar;

/// Port through which the processing pipeline reports stage completions.
#[async_trait]
pub trait CommandWaitNotifier: Send + Sync {
    /// Deliver a signal. Returns `true` if a waiting client accepted it.
    async fn notify(&self, signal: WaitSignal) -> bool;
}

#[async_trait]
impl<N> CommandWaitNotifier for Arc<N>
where
    N: CommandWaitNotifier + ?Sized,
{
    async fn notify(&self, signal: WaitSignal) -> bool {
        (**self).notify(signal).await
    }
}

/// Notifier for pipelines running in the same process as the gateway.
#[derive(Debug, Clone)]
pub struct LocalCommandWaitNotifier {
    registrar: Arc<WaitStrategyRegistrar>,
}

impl LocalCommandWaitNotifier {
    pub fn new(registrar: Arc<WaitStrategyRegistrar>) -> Self {
        Self { registrar }
    }
}

#[async_trait]
impl CommandWaitNotifier for LocalCommandWaitNotifier {
    async fn notify(&self, signal: WaitSignal) -> bool {
        self.registrar.next(signal)
    }
}
