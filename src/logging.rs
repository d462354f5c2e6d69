//! Logging setup.
//!
//! The library itself only emits `tracing` events. Embedders that do not
//! install their own subscriber can call [`init_logging`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::ConfigurationError;

/// Filter directives, e.g. `statekeeper=debug`. Takes precedence over config.
pub const LOG_ENV: &str = "STATEKEEPER_LOG";

/// Output format override: `text` or `json`.
pub const LOG_FORMAT_ENV: &str = "STATEKEEPER_LOG_FORMAT";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Enable colored output (text format only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            color: default_true(),
            modules: BTreeMap::new(),
        }
    }
}

/// Install a global subscriber writing to stdout.
///
/// Priority order (highest to lowest):
/// 1. `STATEKEEPER_LOG` / `STATEKEEPER_LOG_FORMAT`
/// 2. `config`
/// 3. Defaults
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidConfig` for an unknown format or
/// directive, or when a global subscriber is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ConfigurationError> {
    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let use_color = config.map_or(true, |c| c.color);

    let registry = Registry::default().with(filter);
    let installed = if format == LogFormat::Json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stdout),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(std::io::stdout),
            )
            .try_init()
    };

    installed.map_err(|e| ConfigurationError::InvalidConfig {
        reason: format!("cannot install log subscriber: {e}"),
    })
}

fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, ConfigurationError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }

    let level = config.map_or("info", |c| c.level.as_str());
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::try_new(level).map_err(|e| ConfigurationError::InvalidConfig {
        reason: format!("invalid log level '{level}': {e}"),
    })?;

    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{module}={module_level}");
            filter = filter.add_directive(directive.parse().map_err(|e| {
                ConfigurationError::InvalidConfig {
                    reason: format!("invalid log directive '{directive}': {e}"),
                }
            })?);
        }
    }

    Ok(filter)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

fn parse_format(raw: &str) -> Option<LogFormat> {
    match raw {
        "text" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

fn determine_format(config: Option<&LoggingConfig>) -> Result<LogFormat, ConfigurationError> {
    if let Some(format) = std::env::var(LOG_FORMAT_ENV).ok().as_deref().and_then(parse_format) {
        return Ok(format);
    }

    let raw = config.map_or("text", |c| c.format.as_str());
    parse_format(raw).ok_or_else(|| ConfigurationError::InvalidConfig {
        reason: format!("invalid log format: {raw} (must be 'json' or 'text')"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "text");
        assert!(config.color);
        assert!(config.modules.is_empty());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("json"), Some(LogFormat::Json));
        assert_eq!(parse_format("text"), Some(LogFormat::Text));
        assert_eq!(parse_format("xml"), None);
    }

    #[test]
    fn test_module_directives_are_validated() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("statekeeper::state".to_string(), "debug".to_string());
        assert!(build_env_filter(Some(&config)).is_ok());

        config
            .modules
            .insert("statekeeper::matcher".to_string(), "loud".to_string());
        assert!(build_env_filter(Some(&config)).is_err());
    }
}
