//! In-memory command bus for tests/dev.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::bus::{CommandBus, CommandBusError, Subscription};
use crate::command::CommandMessage;

/// In-memory fan-out bus.
///
/// - No IO
/// - Every live receiver gets a copy of each command
/// - A send with no live receiver fails instead of dropping the command
#[derive(Debug, Default)]
pub struct InMemoryCommandBus {
    receivers: Mutex<Vec<mpsc::UnboundedSender<CommandMessage>>>,
    closed: AtomicBool,
}

impl InMemoryCommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject all further sends and disconnect existing receivers.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut receivers) = self.receivers.lock() {
            receivers.clear();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandBus for InMemoryCommandBus {
    async fn send(&self, command: CommandMessage) -> Result<(), CommandBusError> {
        if self.is_closed() {
            return Err(CommandBusError::Closed);
        }

        let mut receivers = self
            .receivers
            .lock()
            .map_err(|_| CommandBusError::Poisoned)?;

        // Drop any dead receivers while sending.
        receivers.retain(|tx| tx.send(command.clone()).is_ok());

        if receivers.is_empty() {
            return Err(CommandBusError::NoSubscriber);
        }
        trace!(
            command_id = %command.command_id(),
            receivers = receivers.len(),
            "command delivered"
        );
        Ok(())
    }

    fn receive(&self) -> Subscription<CommandMessage> {
        let (tx, rx) = mpsc::unbounded_channel();

        // A poisoned lock still yields a subscription; it just never receives.
        if let Ok(mut receivers) = self.receivers.lock() {
            if !self.is_closed() {
                receivers.push(tx);
            }
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use replica_core::{AggregateId, TenantId};
    use serde_json::Value as JsonValue;

    use super::*;

    fn command() -> CommandMessage {
        let id = AggregateId::new("order", "order", "A1", TenantId::default());
        CommandMessage::new(id, "order.create", JsonValue::Null)
    }

    #[tokio::test]
    async fn every_receiver_gets_a_copy() {
        let bus = InMemoryCommandBus::new();
        let mut first = bus.receive();
        let mut second = bus.receive();

        let cmd = command();
        bus.send(cmd.clone()).await.unwrap();

        assert_eq!(first.recv().await, Some(cmd.clone()));
        assert_eq!(second.recv().await, Some(cmd));
    }

    #[tokio::test]
    async fn send_without_receiver_fails() {
        let bus = InMemoryCommandBus::new();
        assert_eq!(bus.send(command()).await, Err(CommandBusError::NoSubscriber));
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned() {
        let bus = InMemoryCommandBus::new();
        let dropped = bus.receive();
        drop(dropped);

        assert_eq!(bus.send(command()).await, Err(CommandBusError::NoSubscriber));
    }

    #[tokio::test]
    async fn closed_bus_rejects_sends() {
        let bus = InMemoryCommandBus::new();
        let mut receiver = bus.receive();
        bus.close();

        assert_eq!(bus.send(command()).await, Err(CommandBusError::Closed));
        assert_eq!(receiver.recv_timeout(Duration::from_millis(10)).await, None);
    }
}
