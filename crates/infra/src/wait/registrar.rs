use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use replica_core::CommandId;
use replica_events::WaitSignal;

use super::waiting_for::WaitingFor;

/// Wait strategies of in-flight commands, keyed by command id.
#[derive(Debug, Default)]
pub struct WaitStrategyRegistrar {
    strategies: Mutex<HashMap<CommandId, Arc<WaitingFor>>>,
}

impl WaitStrategyRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every update of the map is a single insert or remove, so a panic
    /// elsewhere while the lock was held cannot leave it half-written.
    fn lock_strategies(&self) -> MutexGuard<'_, HashMap<CommandId, Arc<WaitingFor>>> {
        self.strategies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `waiting` for `command_id`.
    ///
    /// Returns `None` if a strategy is already registered for that command.
    /// The returned guard unregisters the strategy when dropped.
    pub fn register(
        self: &Arc<Self>,
        command_id: CommandId,
        waiting: Arc<WaitingFor>,
    ) -> Option<WaitRegistration> {
        let mut strategies = self.lock_strategies();
        if strategies.contains_key(&command_id) {
            return None;
        }
        strategies.insert(command_id.clone(), Arc::clone(&waiting));
        Some(WaitRegistration {
            registrar: Arc::clone(self),
            command_id,
            waiting,
        })
    }

    pub fn get(&self, command_id: &CommandId) -> Option<Arc<WaitingFor>> {
        self.lock_strategies().get(command_id).cloned()
    }

    pub fn contains(&self, command_id: &CommandId) -> bool {
        self.get(command_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock_strategies().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route a signal to the strategy of its command.
    ///
    /// Returns `true` if a registered strategy accepted it.
    pub fn next(&self, signal: WaitSignal) -> bool {
        let Some(waiting) = self.get(&signal.command_id) else {
            debug!(
                command_id = %signal.command_id,
                stage = %signal.stage,
                "no wait strategy registered for signal"
            );
            return false;
        };
        let command_id = signal.command_id.clone();
        let stage = signal.stage;
        let accepted = waiting.next(signal);
        if !accepted {
            debug!(command_id = %command_id, stage = %stage, "signal ignored by wait strategy");
        }
        accepted
    }

    fn unregister(&self, command_id: &CommandId, waiting: &Arc<WaitingFor>) {
        let mut strategies = self.lock_strategies();
        if strategies
            .get(command_id)
            .is_some_and(|current| Arc::ptr_eq(current, waiting))
        {
            strategies.remove(command_id);
        }
    }
}

/// Keeps a wait strategy registered while alive.
#[derive(Debug)]
pub struct WaitRegistration {
    registrar: Arc<WaitStrategyRegistrar>,
    command_id: CommandId,
    waiting: Arc<WaitingFor>,
}

impl WaitRegistration {
    pub fn command_id(&self) -> &CommandId {
        &self.command_id
    }

    pub fn waiting(&self) -> &Arc<WaitingFor> {
        &self.waiting
    }
}

impl Drop for WaitRegistration {
    fn drop(&mut self) {
        self.registrar.unregister(&self.command_id, &self.waiting);
    }
}

#[cfg(test)]
mod tests {
    use replica_events::CommandStage;

    use super::*;

    #[test]
    fn registration_is_released_on_drop() {
        let registrar = Arc::new(WaitStrategyRegistrar::new());
        let id = CommandId::from("cmd-1");

        let registration = registrar
            .register(id.clone(), Arc::new(WaitingFor::processed("order")))
            .unwrap();
        assert!(registrar.contains(&id));

        drop(registration);
        assert!(registrar.is_empty());
    }

    #[test]
    fn second_registration_for_same_command_is_refused() {
        let registrar = Arc::new(WaitStrategyRegistrar::new());
        let id = CommandId::from("cmd-1");

        let _first = registrar
            .register(id.clone(), Arc::new(WaitingFor::processed("order")))
            .unwrap();
        assert!(registrar
            .register(id, Arc::new(WaitingFor::processed("order")))
            .is_none());
        assert_eq!(registrar.len(), 1);
    }

    #[test]
    fn registrar_keeps_working_after_a_panic_while_locked() {
        let registrar = Arc::new(WaitStrategyRegistrar::new());
        let held = Arc::clone(&registrar);
        let outcome = std::thread::spawn(move || {
            let _guard = held.strategies.lock().unwrap();
            panic!("panic while holding the registrar lock");
        })
        .join();
        assert!(outcome.is_err());
        assert!(registrar.strategies.is_poisoned());

        let id = CommandId::from("cmd-1");
        let registration = registrar
            .register(id.clone(), Arc::new(WaitingFor::processed("order")))
            .expect("a fresh command must register");
        assert!(registrar.contains(&id));
        assert!(registrar
            .register(id.clone(), Arc::new(WaitingFor::processed("order")))
            .is_none());

        drop(registration);
        assert!(registrar.is_empty());
    }

    #[test]
    fn signals_are_routed_by_command_id() {
        let registrar = Arc::new(WaitStrategyRegistrar::new());
        let waiting = Arc::new(WaitingFor::processed("order"));
        let _registration = registrar
            .register(CommandId::from("cmd-1"), Arc::clone(&waiting))
            .unwrap();

        let other = WaitSignal::succeeded(
            CommandId::from("cmd-2"),
            CommandStage::Processed,
            "order",
            "p",
        );
        assert!(!registrar.next(other));
        assert!(!waiting.is_completed());

        let own = WaitSignal::succeeded(
            CommandId::from("cmd-1"),
            CommandStage::Processed,
            "order",
            "p",
        );
        assert!(registrar.next(own));
        assert!(waiting.is_completed());
    }
}
