//! Configuration module for health_probe.
//!
//! This module provides centralized configuration loading from environment
//! variables and JSON monitor definitions.
//!
//! # Example
//!
//! ```rust,ignore
//! use health_probe::config::Config;
//!
//! let config = Config::from_env()?;
//! let monitor = config.monitor.build()?;
//! println!("Probing with {} monitor", monitor.name());
//! ```

mod error;
mod monitor;
mod parse;

pub use error::ConfigError;
pub use monitor::{ExternalConfig, MonitorConfig, ScheduleConfig, TcpConfig};
pub use parse::parse_duration;

use tracing::Level;

use parse::{env_bool, env_opt, env_or};

/// Filter used when neither `LOG_LEVEL` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "health_probe=info";

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Monitor definition.
    pub monitor: MonitorConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            monitor: MonitorConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }
}

/// Settings consumed by [`crate::logging::init`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directives.
    pub filter: String,
    /// Reported as `ctx.service` in JSON lines.
    pub service_name: String,
    /// One JSON object per line instead of plain text.
    pub json: bool,
}

impl LoggingConfig {
    /// `LOG_LEVEL` takes a bare level for this crate and wins over
    /// `RUST_LOG`, which takes full filter directives. An unknown level is
    /// an error rather than a silent fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        let filter = match env_opt("LOG_LEVEL") {
            Some(value) => {
                let level: Level = value.parse().map_err(|_| ConfigError::Invalid {
                    key: "LOG_LEVEL".into(),
                    message: format!("'{}', expected: trace, debug, info, warn, error", value),
                })?;
                format!("health_probe={}", level.as_str().to_ascii_lowercase())
            }
            None => env_opt("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        };

        Ok(Self {
            filter,
            service_name: env_or("SERVICE_NAME", "health_probe"),
            json: env_bool("LOG_JSON", true),
        })
    }
}
