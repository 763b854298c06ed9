//! Shared utilities for verdict
//!
//! Tracing setup and application-level settings used by the binaries.

pub mod config;
pub mod logging;

pub use config::{AppConfig, ConfigError};
pub use logging::{LogFormat, init_tracing};
