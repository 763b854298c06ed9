//! The stock analysis team
//!
//! Every role comes in two flavors: an [`LlmAgent`](verdict_runtime::LlmAgent) configured with the
//! role's prompt and tool, and a deterministic rule-based agent that needs no
//! model. [`llm_team`] and [`rule_team`] assemble a full roster of either.

pub mod orchestrator;
pub mod sentiment;
pub mod technical;

pub use orchestrator::{RuleOrchestrator, llm_orchestrator};
pub use sentiment::{RuleSentimentAnalyst, llm_sentiment_analyst};
pub use technical::{RuleTechnicalAnalyst, llm_technical_analyst};

use crate::config::StockConfig;
use crate::error::Result;
use crate::tools::TICKER_ARGUMENT;
use std::sync::Arc;
use verdict_core::conversation::{current_delegation, tool_results_for};
use verdict_core::{AgentRole, Message, RunContext, ToolCall, ToolResult};
use verdict_llm::LLMProvider;
use verdict_runtime::AgentRoster;

/// Roster of LLM-backed agents sharing one provider
pub fn llm_team(provider: Arc<dyn LLMProvider>, config: &StockConfig) -> Result<AgentRoster> {
    let roster = AgentRoster::new(
        Arc::new(llm_orchestrator(provider.clone(), config)),
        Arc::new(llm_sentiment_analyst(provider.clone(), config)),
        Arc::new(llm_technical_analyst(provider, config)),
    )?;
    Ok(roster)
}

/// Roster of rule-based agents
pub fn rule_team(config: &StockConfig) -> Result<AgentRoster> {
    let roster = AgentRoster::new(
        Arc::new(RuleOrchestrator::new().with_max_delegations(config.max_delegations)),
        Arc::new(RuleSentimentAnalyst::new()),
        Arc::new(RuleTechnicalAnalyst::new()),
    )?;
    Ok(roster)
}

/// Latest result of `role`'s own fetch since it was last handed the floor
pub(crate) fn fetched(history: &[Message], role: AgentRole) -> Option<&ToolResult> {
    let window = current_delegation(history, role);
    tool_results_for(window, role).last().copied()
}

/// Message asking the bridge to run `tool` for the run's ticker
pub(crate) fn fetch_request(role: AgentRole, tool: &str, ctx: &RunContext) -> Message {
    let call = ToolCall::new(format!("{tool}_{}", ctx.turn), tool)
        .with_argument(TICKER_ARGUMENT, ctx.ticker.clone());
    Message::agent(role, "").with_tool_calls(vec![call])
}

/// Closing line every specialist assessment ends with
pub(crate) fn performance_line(category: verdict_core::VerdictCategory) -> String {
    format!("The company performance is {category}")
}
