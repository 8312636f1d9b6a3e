//! Tracing/logging setup shared by every process embedding the replica crates.

pub mod subscriber;

pub use subscriber::{LOG_FILTER_ENV, LOG_FORMAT_ENV, ObservabilityConfig, init_with};

/// Initialize process-wide tracing from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    init_with(&ObservabilityConfig::from_env());
}
