//! Command transport abstraction (mechanics only).
//!
//! The bus hands [`CommandMessage`]s to the processing pipeline. It makes
//! minimal assumptions about the transport: an in-memory channel, a message
//! broker, or anything else that can accept a message and fan it out to
//! receivers.
//!
//! `send` completing successfully means the transport accepted the command.
//! It says nothing about processing; that is what the wait stages are for.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

use crate::command::CommandMessage;
use crate::error_info::{ErrorInfo, codes};

/// A subscription to a message stream.
///
/// Each subscription gets its own copy of every message sent after it was
/// created. Designed for single-consumer use.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. `None` once the sending side is gone.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Take a message if one is ready.
    pub fn try_recv(&mut self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Wait up to `timeout` for the next message.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<M> {
        tokio::time::timeout(timeout, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandBusError {
    #[error("command bus is closed")]
    Closed,

    #[error("no receiver is subscribed to the command bus")]
    NoSubscriber,

    #[error("command bus lock poisoned")]
    Poisoned,

    #[error("command rejected by transport: {0}")]
    Rejected(String),
}

impl ErrorInfo for CommandBusError {
    fn error_code(&self) -> &str {
        codes::COMMAND_DISPATCH_FAILED
    }

    fn error_msg(&self) -> String {
        self.to_string()
    }
}

/// Transport that delivers commands to the processing pipeline.
#[async_trait]
pub trait CommandBus: Send + Sync {
    async fn send(&self, command: CommandMessage) -> Result<(), CommandBusError>;

    fn receive(&self) -> Subscription<CommandMessage>;
}

#[async_trait]
impl<B> CommandBus for Arc<B>
where
    B: CommandBus + ?Sized,
{
    async fn send(&self, command: CommandMessage) -> Result<(), CommandBusError> {
        (**self).send(command).await
    }

    fn receive(&self) -> Subscription<CommandMessage> {
        (**self).receive()
    }
}
