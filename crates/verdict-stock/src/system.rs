//! Stock analysis system
//!
//! Wires the configured team, the gateway factory and the coordination loop
//! into a single entry point.

use crate::agents::{llm_team, rule_team};
use crate::config::{AgentBackend, StockConfig};
use crate::error::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use verdict_core::RunError;
use verdict_gateway::{GatewayFactory, HttpGatewayFactory};
use verdict_llm::LLMProvider;
use verdict_llm::providers::OpenAIProvider;
use verdict_runtime::{AnalysisOutcome, CancellationToken, Coordinator, RunObserver};

/// Description of a configured system
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub model: String,
    pub gateway_url: String,
    pub max_turns: usize,
    pub agents: Vec<String>,
    pub backend: AgentBackend,
}

/// Multi-agent stock analysis: one orchestrator, two specialists
pub struct StockAnalysisSystem {
    config: StockConfig,
    coordinator: Coordinator,
}

impl StockAnalysisSystem {
    pub fn builder() -> StockAnalysisSystemBuilder {
        StockAnalysisSystemBuilder::default()
    }

    /// Build with the given configuration and default collaborators
    pub fn new(config: StockConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    /// Analyze one ticker
    pub async fn analyze(&self, ticker: &str) -> std::result::Result<AnalysisOutcome, RunError> {
        self.coordinator.analyze(ticker).await
    }

    /// Analyze several tickers concurrently, results in input order
    pub async fn analyze_many(
        &self,
        tickers: &[String],
    ) -> Vec<(String, std::result::Result<AnalysisOutcome, RunError>)> {
        self.coordinator.analyze_many(tickers).await
    }

    /// Token cancelling every run of this system
    pub fn cancellation_token(&self) -> CancellationToken {
        self.coordinator.cancellation_token()
    }

    pub fn system_info(&self) -> SystemInfo {
        SystemInfo {
            model: match self.config.backend {
                AgentBackend::Llm => self.config.model.clone(),
                AgentBackend::Rules => "rules".to_string(),
            },
            gateway_url: self.coordinator.gateway_endpoint().to_string(),
            max_turns: self.coordinator.config().max_turns,
            agents: self.coordinator.roster().names(),
            backend: self.config.backend,
        }
    }
}

/// Builder for [`StockAnalysisSystem`]
#[derive(Default)]
pub struct StockAnalysisSystemBuilder {
    config: Option<StockConfig>,
    provider: Option<Arc<dyn LLMProvider>>,
    gateways: Option<Arc<dyn GatewayFactory>>,
    observer: Option<Arc<dyn RunObserver>>,
    cancel: Option<CancellationToken>,
}

impl StockAnalysisSystemBuilder {
    pub fn config(mut self, config: StockConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Provider for the LLM backend; defaults to OpenAI configured from the environment
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Gateway sessions; defaults to HTTP against the configured URL
    pub fn gateways(mut self, gateways: Arc<dyn GatewayFactory>) -> Self {
        self.gateways = Some(gateways);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<StockAnalysisSystem> {
        let config = self.config.unwrap_or_else(StockConfig::from_env);
        config.validate()?;

        let roster = match config.backend {
            AgentBackend::Llm => {
                let provider: Arc<dyn LLMProvider> = match self.provider {
                    Some(provider) => provider,
                    None => Arc::new(OpenAIProvider::from_env()?),
                };
                info!(provider = provider.name(), model = %config.model, "Using LLM agents");
                llm_team(provider, &config)?
            }
            AgentBackend::Rules => {
                info!("Using rule-based agents");
                rule_team(&config)?
            }
        };

        let gateways: Arc<dyn GatewayFactory> = match self.gateways {
            Some(gateways) => gateways,
            None => Arc::new(HttpGatewayFactory::new(config.gateway_config())?),
        };

        let mut builder = Coordinator::builder(roster, gateways).config(config.loop_config());
        if let Some(observer) = self.observer {
            builder = builder.observer(observer);
        }
        if let Some(cancel) = self.cancel {
            builder = builder.cancellation_token(cancel);
        }

        Ok(StockAnalysisSystem {
            config,
            coordinator: builder.build(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_runtime::testing::{GatewayScript, ScriptedGatewayFactory};

    fn rules_config() -> StockConfig {
        StockConfig::builder()
            .backend(AgentBackend::Rules)
            .build()
            .unwrap()
    }

    #[test]
    fn test_system_info() {
        let system = StockAnalysisSystem::builder()
            .config(rules_config())
            .gateways(Arc::new(ScriptedGatewayFactory::new(GatewayScript::new())))
            .build()
            .unwrap();

        let info = system.system_info();
        assert_eq!(info.model, "rules");
        assert_eq!(info.gateway_url, "scripted://gateway");
        assert_eq!(info.max_turns, 12);
        assert_eq!(info.agents.len(), 3);
        assert_eq!(info.backend, AgentBackend::Rules);
    }

    #[test]
    fn test_default_gateway_is_http() {
        let system = StockAnalysisSystem::new(rules_config()).unwrap();
        assert_eq!(system.system_info().gateway_url, "http://localhost:8000/mcp");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = rules_config();
        config.max_turns = 0;
        assert!(StockAnalysisSystem::new(config).is_err());
    }
}
