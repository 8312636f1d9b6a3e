//! Wait protocol between the command gateway and the processing pipeline.
//!
//! A client picks a [`WaitingFor`] strategy (one stage of one context), the
//! gateway registers it under the command id, and the pipeline reports stage
//! completions through a [`CommandWaitNotifier`]. Each stage is an independent
//! channel: a signal only resolves strategies waiting for exactly that stage.

pub mod notifier;
pub mod registrar;
pub mod waiting_for;

pub use notifier::{CommandWaitNotifier, LocalCommandWaitNotifier};
pub use registrar::{WaitRegistration, WaitStrategyRegistrar};
pub use waiting_for::{WaitError, WaitingFor};
