//! Stock verdict team
//!
//! This crate assembles the three-agent team that produces a STRONG, MIXED or
//! POOR verdict for a stock ticker:
//!
//! - `SentimentAnalyst`: fetches recent news through `news_sentiment_tool`
//!   and grades its tone
//! - `TechnicalAnalyst`: fetches SMA50, SMA200, RSI and MACD through
//!   `technical_analysis_tool` and interprets them
//! - `Orchestrator`: consults both specialists and concludes with the final
//!   verdict
//!
//! Each role is available LLM-backed (OpenAI-compatible function calling) or
//! rule-based, selected by [`AgentBackend`].
//!
//! # Example
//!
//! ```rust,ignore
//! use verdict_stock::{AgentBackend, StockAnalysisSystem, StockConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StockConfig::builder()
//!         .gateway_url("http://localhost:8000")
//!         .backend(AgentBackend::Rules)
//!         .build()?;
//!
//!     let system = StockAnalysisSystem::new(config)?;
//!     let outcome = system.analyze("AAPL").await?;
//!     println!("{}", outcome.verdict.text);
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod config;
pub mod error;
pub mod indicators;
pub mod prompts;
pub mod system;
pub mod tools;

pub use agents::{
    RuleOrchestrator, RuleSentimentAnalyst, RuleTechnicalAnalyst, llm_team, rule_team,
};
pub use config::{AgentBackend, StockConfig, StockConfigBuilder};
pub use error::{Result, StockError};
pub use system::{StockAnalysisSystem, StockAnalysisSystemBuilder, SystemInfo};
pub use tools::{NEWS_SENTIMENT_TOOL, TECHNICAL_ANALYSIS_TOOL};

// Re-export the run types callers handle
pub use verdict_core::{RunError, RunErrorKind, Verdict, VerdictCategory};
pub use verdict_runtime::{AnalysisOutcome, CancellationToken, RunObserver};
