//! Global `tracing` subscriber for the decoder and the CLI.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The `log` section of `chaintrace.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level for every target without an override.
    #[serde(default = "default_level")]
    pub level: String,
    /// Crate name (dashes allowed) → level, e.g. `chaintrace-semantics: debug`.
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// One JSON object per line instead of the text formatter.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Filter directives: `"info,chaintrace_semantics=debug"`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

#[derive(Debug, Error)]
pub enum TracingInitError {
    #[error("invalid log filter '{directives}': {reason}")]
    Filter { directives: String, reason: String },

    #[error("global subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Install the global subscriber. Call once at application startup; a
/// second call returns [`TracingInitError::AlreadyInstalled`].
pub fn init_tracing(config: &LogConfig) -> Result<(), TracingInitError> {
    let directives = config.directives();
    let filter = EnvFilter::try_new(&directives).map_err(|e| TracingInitError::Filter {
        directives: directives.clone(),
        reason: e.to_string(),
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    result.map_err(|e| TracingInitError::AlreadyInstalled(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_include_component_overrides() {
        let config: LogConfig = serde_yaml::from_str(
            "level: warn\ncomponents:\n  chaintrace-semantics: debug\n  chaintrace-decoder: trace\n",
        )
        .unwrap();
        assert_eq!(
            config.directives(),
            "warn,chaintrace_decoder=trace,chaintrace_semantics=debug"
        );
        assert!(!config.json);
    }

    #[test]
    fn second_install_is_an_error() {
        let config = LogConfig::default();
        let _ = init_tracing(&config);
        let second = init_tracing(&config);
        assert!(matches!(second, Err(TracingInitError::AlreadyInstalled(_))));
    }
}
