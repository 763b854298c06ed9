//! Configuration for stock analysis runs

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use verdict_gateway::config::{DEFAULT_GATEWAY_URL, GATEWAY_URL_ENV};
use verdict_gateway::{GatewayConfig, RetryPolicy};
use verdict_runtime::{BridgeConfig, LlmAgentConfig, LoopConfig};

/// How the agents of a run generate their messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentBackend {
    /// OpenAI-compatible chat completions (default)
    #[default]
    Llm,
    /// Deterministic rule-based agents, no model required
    Rules,
}

impl FromStr for AgentBackend {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(AgentBackend::Llm),
            "rules" => Ok(AgentBackend::Rules),
            other => Err(StockError::ConfigError(format!(
                "unknown backend '{other}', expected 'llm' or 'rules'"
            ))),
        }
    }
}

impl fmt::Display for AgentBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentBackend::Llm => f.write_str("llm"),
            AgentBackend::Rules => f.write_str("rules"),
        }
    }
}

/// Configuration for stock analysis runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Model used by every LLM agent
    pub model: String,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature for sampling
    pub temperature: f32,

    /// Tool gateway base URL
    pub gateway_url: String,

    /// JSON-RPC path under `gateway_url`
    pub rpc_path: String,

    /// Agent turns allowed per run
    pub max_turns: usize,

    /// Times the orchestrator may consult the same specialist
    pub max_delegations: usize,

    /// Per tool call timeout
    pub tool_timeout: Duration,

    /// Per agent turn timeout
    pub agent_timeout: Duration,

    /// Wall-clock budget of one run
    pub run_timeout: Duration,

    pub backend: AgentBackend,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            rpc_path: "/mcp".to_string(),
            max_turns: 12,
            max_delegations: 2,
            tool_timeout: Duration::from_secs(30),
            agent_timeout: Duration::from_secs(120),
            run_timeout: Duration::from_secs(300),
            backend: AgentBackend::Llm,
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Defaults with the gateway URL taken from `MCP_SERVER_URL` when set
    pub fn from_env() -> Self {
        Self {
            gateway_url: GatewayConfig::from_env().url,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.backend == AgentBackend::Llm && self.model.trim().is_empty() {
            return Err(StockError::ConfigError("model must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(StockError::ConfigError(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }

        if self.max_turns == 0 {
            return Err(StockError::ConfigError(
                "max_turns must be greater than 0".to_string(),
            ));
        }

        if self.max_delegations == 0 {
            return Err(StockError::ConfigError(
                "max_delegations must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("tool_timeout", self.tool_timeout),
            ("agent_timeout", self.agent_timeout),
            ("run_timeout", self.run_timeout),
        ] {
            if value.is_zero() {
                return Err(StockError::ConfigError(format!("{name} must be greater than 0")));
            }
        }

        self.gateway_config().validate()?;
        Ok(())
    }

    /// Gateway connection settings
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new(&self.gateway_url)
            .with_rpc_path(&self.rpc_path)
            .with_timeout(self.tool_timeout)
    }

    /// Coordination loop limits
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_turns: self.max_turns,
            max_delegations: self.max_delegations,
            agent_timeout: self.agent_timeout,
            run_timeout: self.run_timeout,
            bridge: BridgeConfig {
                call_timeout: self.tool_timeout,
                retry: RetryPolicy::default(),
            },
        }
    }

    /// Generation settings for an LLM agent with the given instructions
    pub fn llm_config(&self, system_prompt: &str) -> LlmAgentConfig {
        LlmAgentConfig {
            model: self.model.clone(),
            system_prompt: system_prompt.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    model: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    gateway_url: Option<String>,
    rpc_path: Option<String>,
    max_turns: Option<usize>,
    max_delegations: Option<usize>,
    tool_timeout: Option<Duration>,
    agent_timeout: Option<Duration>,
    run_timeout: Option<Duration>,
    backend: Option<AgentBackend>,
}

impl StockConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    pub fn rpc_path(mut self, path: impl Into<String>) -> Self {
        self.rpc_path = Some(path.into());
        self
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn max_delegations(mut self, max_delegations: usize) -> Self {
        self.max_delegations = Some(max_delegations);
        self
    }

    pub fn tool_timeout(mut self, duration: Duration) -> Self {
        self.tool_timeout = Some(duration);
        self
    }

    pub fn agent_timeout(mut self, duration: Duration) -> Self {
        self.agent_timeout = Some(duration);
        self
    }

    pub fn run_timeout(mut self, duration: Duration) -> Self {
        self.run_timeout = Some(duration);
        self
    }

    pub fn backend(mut self, backend: AgentBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Take the gateway URL from `MCP_SERVER_URL` unless one was set
    pub fn with_env_gateway_url(mut self) -> Self {
        if self.gateway_url.is_none() {
            if let Ok(url) = std::env::var(GATEWAY_URL_ENV) {
                if !url.trim().is_empty() {
                    self.gateway_url = Some(url.trim().to_string());
                }
            }
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            model: self.model.unwrap_or(defaults.model),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            gateway_url: self.gateway_url.unwrap_or(defaults.gateway_url),
            rpc_path: self.rpc_path.unwrap_or(defaults.rpc_path),
            max_turns: self.max_turns.unwrap_or(defaults.max_turns),
            max_delegations: self.max_delegations.unwrap_or(defaults.max_delegations),
            tool_timeout: self.tool_timeout.unwrap_or(defaults.tool_timeout),
            agent_timeout: self.agent_timeout.unwrap_or(defaults.agent_timeout),
            run_timeout: self.run_timeout.unwrap_or(defaults.run_timeout),
            backend: self.backend.unwrap_or(defaults.backend),
        };

        config.validate()?;
        Ok(config)
    }
}
