//! Command gateway: dispatch plus optional waiting on a processing stage.
//!
//! ```text
//! send(command, wait)
//!   ↓
//! 1. Register the wait strategy under the command id
//!   ↓
//! 2. Hand the command to the command bus
//!   ├─ failure → registration released, bus error returned
//!   ↓
//! 3. Signal SENT to the registered strategy
//!   ↓
//! 4. Return the exchange (caller may await the strategy)
//! ```
//!
//! Every outcome of the waiting variants is a [`CommandResult`]; failures are
//! returned as [`CommandResultError`] and told apart by `error_code` and
//! `stage`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use replica_core::CommandId;
use replica_events::{
    CommandBus, CommandBusError, CommandMessage, CommandResult, CommandResultError, CommandStage,
    ErrorInfo, WaitSignal, codes,
};

use crate::config::GatewayConfig;
use crate::wait::{WaitError, WaitRegistration, WaitStrategyRegistrar, WaitingFor};

/// Processor name reported on results the gateway builds itself.
pub const COMMAND_GATEWAY_PROCESSOR_NAME: &str = "CommandGateway";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Bus(#[from] CommandBusError),

    #[error("a wait strategy is already registered for command [{0}]")]
    AlreadyRegistered(CommandId),
}

impl ErrorInfo for GatewayError {
    fn error_code(&self) -> &str {
        match self {
            GatewayError::Bus(err) => err.error_code(),
            GatewayError::AlreadyRegistered(_) => codes::BAD_REQUEST,
        }
    }

    fn error_msg(&self) -> String {
        self.to_string()
    }
}

/// A dispatched command and the strategy registered for it.
///
/// Dropping the exchange unregisters the strategy, whether or not it was
/// awaited.
#[derive(Debug)]
pub struct ClientCommandExchange {
    message: CommandMessage,
    waiting: Arc<WaitingFor>,
    _registration: WaitRegistration,
}

impl ClientCommandExchange {
    pub fn message(&self) -> &CommandMessage {
        &self.message
    }

    pub fn waiting(&self) -> &Arc<WaitingFor> {
        &self.waiting
    }

    /// Await the registered strategy, bounded by `timeout`.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<WaitSignal, WaitError> {
        self.waiting.waiting_within(timeout).await
    }
}

#[async_trait]
pub trait CommandGateway: Send + Sync {
    /// Hand the command to the bus without registering any wait strategy.
    async fn send_without_wait(&self, command: CommandMessage) -> Result<(), GatewayError>;

    /// Register `wait` and dispatch the command.
    ///
    /// Returns once the bus accepted the command; business processing is not
    /// awaited.
    async fn send(
        &self,
        command: CommandMessage,
        wait: Arc<WaitingFor>,
    ) -> Result<ClientCommandExchange, GatewayError>;

    fn processor_name(&self) -> &str {
        COMMAND_GATEWAY_PROCESSOR_NAME
    }

    /// Timeout used when a strategy doesn't carry its own.
    fn default_wait_timeout(&self) -> Option<Duration> {
        None
    }

    /// Dispatch and wait for the stage `wait` targets.
    ///
    /// - dispatch failure: failed SENT result (processor [`COMMAND_GATEWAY_PROCESSOR_NAME`])
    /// - failed signal: the signal's result
    /// - timeout: result with code `RequestTimeout` at the waited stage
    async fn send_and_wait(
        &self,
        command: CommandMessage,
        wait: Arc<WaitingFor>,
    ) -> Result<CommandResult, CommandResultError> {
        let stage = wait.waited_stage();
        let timeout = wait.timeout().or(self.default_wait_timeout());

        let exchange = match self.send(command.clone(), wait).await {
            Ok(exchange) => exchange,
            Err(err) => {
                return Err(CommandResultError(CommandResult::from_error(
                    &err,
                    &command,
                    CommandStage::Sent,
                    self.processor_name(),
                )));
            }
        };

        let result = match exchange.wait(timeout).await {
            Ok(signal) => signal.to_result(exchange.message()),
            Err(err) => {
                warn!(
                    command_id = %exchange.message().command_id(),
                    stage = %stage,
                    error = %err,
                    "command wait failed"
                );
                CommandResult::from_error(&err, exchange.message(), stage, self.processor_name())
            }
        };

        if result.succeeded {
            Ok(result)
        } else {
            Err(CommandResultError(result))
        }
    }

    /// Dispatch and report the SENT outcome as a value, never as an error.
    async fn send_and_wait_for_sent(&self, command: CommandMessage) -> CommandResult {
        match self.send_without_wait(command.clone()).await {
            Ok(()) => CommandResult::succeeded(&command, CommandStage::Sent, self.processor_name()),
            Err(err) => {
                CommandResult::from_error(&err, &command, CommandStage::Sent, self.processor_name())
            }
        }
    }

    async fn send_and_wait_for_processed(
        &self,
        command: CommandMessage,
    ) -> Result<CommandResult, CommandResultError> {
        let wait = Arc::new(WaitingFor::processed(command.context_name()));
        self.send_and_wait(command, wait).await
    }
}

/// Gateway dispatching through a [`CommandBus`] and a local registrar.
#[derive(Debug)]
pub struct DefaultCommandGateway<B> {
    bus: B,
    registrar: Arc<WaitStrategyRegistrar>,
    config: GatewayConfig,
}

impl<B: CommandBus> DefaultCommandGateway<B> {
    pub fn new(bus: B, registrar: Arc<WaitStrategyRegistrar>) -> Self {
        Self::with_config(bus, registrar, GatewayConfig::default())
    }

    pub fn with_config(
        bus: B,
        registrar: Arc<WaitStrategyRegistrar>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            bus,
            registrar,
            config,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn registrar(&self) -> &Arc<WaitStrategyRegistrar> {
        &self.registrar
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[async_trait]
impl<B: CommandBus> CommandGateway for DefaultCommandGateway<B> {
    #[instrument(skip(self, command), fields(command_id = %command.command_id()), err)]
    async fn send_without_wait(&self, command: CommandMessage) -> Result<(), GatewayError> {
        self.bus.send(command).await.map_err(|err| {
            warn!(error = %err, "command dispatch failed");
            GatewayError::from(err)
        })
    }

    #[instrument(
        skip(self, command, wait),
        fields(command_id = %command.command_id(), stage = %wait.waited_stage()),
        err
    )]
    async fn send(
        &self,
        command: CommandMessage,
        wait: Arc<WaitingFor>,
    ) -> Result<ClientCommandExchange, GatewayError> {
        let command_id = command.command_id().clone();
        let registration = self
            .registrar
            .register(command_id.clone(), Arc::clone(&wait))
            .ok_or_else(|| GatewayError::AlreadyRegistered(command_id.clone()))?;

        if let Err(err) = self.bus.send(command.clone()).await {
            warn!(error = %err, "command dispatch failed");
            return Err(err.into());
        }
        debug!("command dispatched");

        self.registrar.next(WaitSignal::succeeded(
            command_id,
            CommandStage::Sent,
            command.context_name(),
            self.processor_name(),
        ));

        Ok(ClientCommandExchange {
            message: command,
            waiting: wait,
            _registration: registration,
        })
    }

    fn processor_name(&self) -> &str {
        &self.config.processor_name
    }

    fn default_wait_timeout(&self) -> Option<Duration> {
        Some(self.config.wait_timeout)
    }
}
