//! Configuration loading and representation.

use std::time::Duration;

use tracing::warn;

use crate::gateway::COMMAND_GATEWAY_PROCESSOR_NAME;

/// Environment variable overriding [`GatewayConfig::wait_timeout`], in milliseconds.
pub const COMMAND_WAIT_TIMEOUT_ENV: &str = "REPLICA_COMMAND_WAIT_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Timeout applied to wait strategies that don't set their own.
    pub wait_timeout: Duration,
    /// Processor name reported on results the gateway synthesizes.
    pub processor_name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(30),
            processor_name: COMMAND_GATEWAY_PROCESSOR_NAME.to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(COMMAND_WAIT_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.wait_timeout = Duration::from_millis(ms),
                Err(err) => warn!(
                    key = COMMAND_WAIT_TIMEOUT_ENV,
                    value = %raw,
                    error = %err,
                    "ignoring invalid command wait timeout"
                ),
            }
        }
        config
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_processor_name(mut self, name: impl Into<String>) -> Self {
        self.processor_name = name.into();
        self
    }
}

/// Latency added by the delaying decorators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayConfig {
    pub delay: Duration,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(5),
        }
    }
}

impl DelayConfig {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.wait_timeout, Duration::from_secs(30));
        assert_eq!(config.processor_name, "CommandGateway");
    }

    #[test]
    fn wait_timeout_from_lookup() {
        let config = GatewayConfig::from_lookup(|key| {
            (key == COMMAND_WAIT_TIMEOUT_ENV).then(|| "250".to_string())
        });
        assert_eq!(config.wait_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_wait_timeout_keeps_default() {
        let config = GatewayConfig::from_lookup(|_| Some("soon".to_string()));
        assert_eq!(config.wait_timeout, Duration::from_secs(30));
    }
}
