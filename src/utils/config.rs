//! Dispatcher configuration
//!
//! Process-wide defaults loaded from an optional config file layered with
//! `AGENT_DISPATCHER_*` environment variables. Per-agent limits live on the
//! agent definitions themselves; this only covers what applies when a
//! definition leaves something unset.

use crate::utils::errors::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dispatcher-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Execution timeout applied when an agent definition has none (ms)
    pub default_timeout_ms: u64,

    /// Capacity of the lifecycle event broadcast channel
    pub event_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            event_capacity: 256,
        }
    }
}

impl DispatcherConfig {
    /// Load configuration from `dispatcher.*` in the working directory
    /// (if present) layered with `AGENT_DISPATCHER_*` environment variables
    pub fn load() -> Result<Self> {
        Self::load_from("dispatcher")
    }

    /// Load configuration from an explicit file path (extension optional),
    /// layered with `AGENT_DISPATCHER_*` environment variables
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("AGENT_DISPATCHER").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Default execution timeout as a `Duration`
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.default_timeout_ms, 30_000);
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = DispatcherConfig::load_from("/nonexistent/dispatcher").unwrap();
        assert_eq!(config.default_timeout_ms, 30_000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatcher.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"default_timeout_ms": 5000}}"#).unwrap();

        let config = DispatcherConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.default_timeout_ms, 5000);
        // Unset keys fall back to defaults
        assert_eq!(config.event_capacity, 256);
    }
}
