//! Runtime configuration.
//!
//! Settings are layered with the `config` crate, lowest priority first:
//! built-in defaults, an optional file, then `STATEKEEPER__*` environment
//! variables (for example `STATEKEEPER__DEFAULT_TTL_MS=60000` or
//! `STATEKEEPER__LOGGING__LEVEL=debug`).

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::logging::LoggingConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "STATEKEEPER";

fn config_err(e: impl std::fmt::Display) -> ConfigurationError {
    ConfigurationError::InvalidConfig {
        reason: e.to_string(),
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// TTL applied to records that carry none. Unset means such contexts
    /// never expire.
    #[serde(default)]
    pub default_ttl_ms: Option<u64>,

    /// Interval of the background expiry sweeper. Unset disables it.
    #[serde(default)]
    pub sweep_interval_ms: Option<u64>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StateConfig {
    /// Load defaults, then `path` (if given), then the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidConfig` when the file cannot be
    /// read or a value has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = Config::builder()
            .set_default("logging.level", "info")
            .map_err(config_err)?
            .set_default("logging.format", "text")
            .map_err(config_err)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?
            .try_deserialize()
            .map_err(config_err)
    }

    /// Parse settings from a JSON document; missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidConfig` for malformed JSON.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(raw).map_err(config_err)
    }

    /// TTL applied to records without an explicit one.
    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_ms.map(Duration::from_millis)
    }

    /// Sweeper interval, if the sweeper is enabled.
    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_never_expire() {
        let config = StateConfig::default();
        assert_eq!(config.default_ttl(), None);
        assert_eq!(config.sweep_interval(), None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn json_fills_missing_fields() {
        let config = StateConfig::from_json_str(r#"{"default_ttl_ms": 1500}"#).unwrap();
        assert_eq!(config.default_ttl(), Some(Duration::from_millis(1500)));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn zero_sweep_interval_disables_sweeper() {
        let config = StateConfig {
            sweep_interval_ms: Some(0),
            ..StateConfig::default()
        };
        assert_eq!(config.sweep_interval(), None);
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let err = StateConfig::from_json_str(r#"{"default_ttl_ms": "soon"}"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidConfig { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statekeeper.json");
        std::fs::write(
            &path,
            r#"{"default_ttl_ms": 250, "logging": {"level": "debug"}}"#,
        )
        .unwrap();

        let config = StateConfig::load(Some(&path)).unwrap();
        assert_eq!(config.default_ttl(), Some(Duration::from_millis(250)));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn load_missing_file_fails() {
        let err = StateConfig::load(Some(Path::new("/nonexistent/statekeeper.toml"))).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidConfig { .. }));
    }
}
