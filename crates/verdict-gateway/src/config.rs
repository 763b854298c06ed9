//! Tool Gateway configuration
//!
//! ```json
//! {
//!   "url": "http://localhost:8000",
//!   "rpcPath": "/mcp",
//!   "headers": { "Authorization": "Bearer ${GATEWAY_TOKEN}" },
//!   "timeoutSecs": 30
//! }
//! ```

use crate::error::{GatewayError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Default gateway base URL
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8000";

/// Environment variable overriding the gateway URL
pub const GATEWAY_URL_ENV: &str = "MCP_SERVER_URL";

fn default_rpc_path() -> String {
    "/mcp".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Where and how to reach the Tool Gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://localhost:8000`
    pub url: String,

    /// Path of the JSON-RPC endpoint under `url`
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,

    /// Extra HTTP headers; values may reference `${VAR}` or `$VAR`
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_URL)
    }
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            rpc_path: default_rpc_path(),
            headers: HashMap::new(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Default config with the URL taken from `MCP_SERVER_URL` when set
    pub fn from_env() -> Self {
        match std::env::var(GATEWAY_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        }
    }

    pub fn with_rpc_path(mut self, path: impl Into<String>) -> Self {
        self.rpc_path = path.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Full JSON-RPC endpoint
    ///
    /// A `url` that already ends with the RPC path is used as-is.
    pub fn rpc_url(&self) -> String {
        let base = self.base();
        let path = self.rpc_path.trim_end_matches('/');
        if path.is_empty() || base.ends_with(path) {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Liveness probe endpoint
    pub fn health_url(&self) -> String {
        let base = self.base();
        let path = self.rpc_path.trim_end_matches('/');
        let root = if !path.is_empty() && base.ends_with(path) {
            &base[..base.len() - path.len()]
        } else {
            base
        };
        format!("{root}/health")
    }

    /// Check that the URL is an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        let parsed = Url::parse(&self.rpc_url())
            .map_err(|e| GatewayError::ConfigError(format!("invalid gateway url '{}': {e}", self.url)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GatewayError::ConfigError(format!(
                "unsupported gateway scheme '{}'",
                parsed.scheme()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(GatewayError::ConfigError(
                "timeoutSecs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Header map with environment references resolved
    pub fn resolved_headers(&self) -> Result<HashMap<String, String>> {
        self.headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), resolve_env_string(value)?)))
            .collect()
    }
}

/// Resolve `${VAR}` and `$VAR` references from the environment
///
/// ```
/// # use verdict_gateway::config::resolve_env_string;
/// # unsafe { std::env::set_var("DOC_GATEWAY_TOKEN", "abc") };
/// let header = resolve_env_string("Bearer ${DOC_GATEWAY_TOKEN}")?;
/// assert_eq!(header, "Bearer abc");
/// # Ok::<(), verdict_gateway::GatewayError>(())
/// ```
pub fn resolve_env_string(s: &str) -> Result<String> {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .map_err(|e| GatewayError::ConfigError(e.to_string()))?;

    let mut resolved = String::with_capacity(s.len());
    let mut last = 0;

    for caps in pattern.captures_iter(s) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2))) else {
            continue;
        };
        let value = std::env::var(name.as_str())
            .map_err(|_| GatewayError::EnvVarNotFound(name.as_str().to_string()))?;
        resolved.push_str(&s[last..whole.start()]);
        resolved.push_str(&value);
        last = whole.end();
    }

    resolved.push_str(&s[last..]);
    Ok(resolved)
}
