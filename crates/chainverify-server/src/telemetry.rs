//! Tracing / logging initialisation.

use std::collections::HashMap;

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level per component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    pub level: String,
    /// Per-crate overrides: `chainverify_http` → `debug`
    pub components: HashMap<String, String>,
    /// JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `"info,chainverify_http=debug"` style filter string.
    pub fn directives(&self) -> String {
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        let mut directives = self.level.clone();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Install the global subscriber. `RUST_LOG` is not consulted; the level
/// comes from [`LogConfig`] so it can be set alongside the rest of the config.
pub fn init_tracing(config: &LogConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_new(config.directives()).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_are_sorted_and_snake_cased() {
        let cfg = LogConfig {
            level: "warn".into(),
            components: HashMap::from([
                ("tower-http".to_string(), "debug".to_string()),
                ("chainverify-server".to_string(), "trace".to_string()),
            ]),
            json: true,
        };
        assert_eq!(cfg.directives(), "warn,chainverify_server=trace,tower_http=debug");
        assert_eq!(LogConfig::default().directives(), "info");
    }
}
