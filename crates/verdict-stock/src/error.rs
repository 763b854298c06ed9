//! Error types for the stock analysis system

use thiserror::Error;
use verdict_core::RunError;
use verdict_gateway::GatewayError;
use verdict_llm::LLMError;

/// Errors raised while assembling or running the analysis team
#[derive(Debug, Error)]
pub enum StockError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Tool gateway could not be set up
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// LLM provider could not be set up
    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    /// Agent construction or response failure
    #[error("Agent error: {0}")]
    Agent(#[from] verdict_core::Error),

    /// An analysis run failed
    #[error("Analysis failed: {0}")]
    Run(#[from] RunError),
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

/// Convert StockError to verdict_core::Error
impl From<StockError> for verdict_core::Error {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Agent(inner) => inner,
            other => verdict_core::Error::InitializationFailed(other.to_string()),
        }
    }
}
