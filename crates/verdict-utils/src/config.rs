//! Application configuration

use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the deployment environment
pub const ENV_VAR: &str = "VERDICT_ENV";

/// Environment variable selecting the log format
pub const LOG_FORMAT_VAR: &str = "VERDICT_LOG_FORMAT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Application-level settings shared by the binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name
    pub app_name: String,
    /// Environment (development, production, ...)
    pub environment: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "verdict".to_string(),
            environment: "development".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `VERDICT_ENV` and `VERDICT_LOG_FORMAT`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(environment) = lookup(ENV_VAR).filter(|v| !v.trim().is_empty()) {
            config.environment = environment.trim().to_string();
        }
        if let Some(format) = lookup(LOG_FORMAT_VAR).filter(|v| !v.trim().is_empty()) {
            config.log_format = format.parse().map_err(|reason| ConfigError::InvalidValue {
                name: LOG_FORMAT_VAR,
                reason,
            })?;
        }

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}
