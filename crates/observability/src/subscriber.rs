//! Subscriber installation.
//!
//! Logs are JSON with timestamps by default. `REPLICA_LOG_FORMAT=text` switches
//! to the plain formatter for local runs.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::SystemTime;

/// Filter directives, as understood by [`EnvFilter`].
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

/// `json` (default) or `text`.
pub const LOG_FORMAT_ENV: &str = "REPLICA_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Directives used when none are given in the environment.
    pub default_filter: String,
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: true,
        }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unknown formats keep JSON.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|f| !f.trim().is_empty()) {
            config.default_filter = filter;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.json = !matches!(
                format.trim().to_ascii_lowercase().as_str(),
                "text" | "plain" | "pretty"
            );
        }
        config
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Filter built from [`default_filter`](Self::default_filter), or `info`
    /// if the directives don't parse.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.default_filter).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber described by `config`.
///
/// Returns `false` if a subscriber was already installed, in which case
/// nothing changes.
pub fn init_with(config: &ObservabilityConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_timer(SystemTime)
        .with_target(false);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(
            filter = %config.default_filter,
            json = config.json,
            "tracing initialized"
        );
    }
    installed
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_to_json_at_info() {
        let config = ObservabilityConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ObservabilityConfig::default());
        assert!(config.json);
        assert_eq!(config.default_filter, "info");
    }

    #[test]
    fn environment_overrides_filter_and_format() {
        let config = ObservabilityConfig::from_lookup(lookup(&[
            (LOG_FILTER_ENV, "replica_infra=debug"),
            (LOG_FORMAT_ENV, "Text"),
        ]));
        assert_eq!(config.default_filter, "replica_infra=debug");
        assert!(!config.json);
    }

    #[test]
    fn blank_filter_and_unknown_format_keep_defaults() {
        let config = ObservabilityConfig::from_lookup(lookup(&[
            (LOG_FILTER_ENV, "  "),
            (LOG_FORMAT_ENV, "xml"),
        ]));
        assert_eq!(config, ObservabilityConfig::default());
    }

    #[test]
    fn unparseable_directives_fall_back_to_info() {
        let config = ObservabilityConfig::default().with_default_filter("replica=loud");
        assert_eq!(config.env_filter().max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn second_init_is_a_no_op() {
        let config = ObservabilityConfig::default().with_json(false);
        init_with(&config);
        assert!(!init_with(&config));
    }
}
