//! Technical analyst

use super::{fetch_request, fetched, performance_line};
use crate::config::StockConfig;
use crate::indicators::{Indicators, interpret};
use crate::prompts;
use crate::tools::{TECHNICAL_ANALYSIS_TOOL, tools_for};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;
use verdict_core::{Agent, AgentRole, Message, Result, RunContext, ToolResult, ToolSpec};
use verdict_llm::LLMProvider;
use verdict_runtime::LlmAgent;

/// LLM-backed technical analyst declaring the indicator tool
pub fn llm_technical_analyst(provider: Arc<dyn LLMProvider>, config: &StockConfig) -> LlmAgent {
    LlmAgent::new(
        AgentRole::Technical,
        provider,
        config.llm_config(prompts::TECHNICAL_ANALYST),
    )
    .with_tools(tools_for(AgentRole::Technical))
}

/// Rule-based technical analyst
///
/// Reads SMA50/SMA200, RSI and MACD from the tool payload and scores each
/// one bullish or bearish.
#[derive(Debug)]
pub struct RuleTechnicalAnalyst {
    tools: Vec<ToolSpec>,
}

impl RuleTechnicalAnalyst {
    pub fn new() -> Self {
        Self {
            tools: tools_for(AgentRole::Technical),
        }
    }

    fn assess(ticker: &str, result: &ToolResult) -> String {
        if result.is_error() {
            return format!("Technical data for {ticker} is unavailable: {}", result.render());
        }

        let indicators = Indicators::from_value(&result.content);
        let Some(interpretation) = interpret(&indicators) else {
            let raw = result.content_text();
            let raw = raw.trim();
            return if raw.is_empty() {
                format!("Technical data for {ticker} is unavailable: the tool returned nothing.")
            } else {
                format!("Technical data for {ticker} is unavailable: {raw}")
            };
        };

        let mut report = format!("Technical analysis for {ticker}:\n");
        for reading in &interpretation.readings {
            let _ = writeln!(report, "- {} ({})", reading.detail, reading.signal);
        }
        if let Some(hist) = indicators.macd_hist {
            let _ = writeln!(report, "- MACD histogram {hist:.2}");
        }
        let _ = writeln!(
            report,
            "Net signal score {:+} across {} indicators.",
            interpretation.score,
            interpretation.readings.len()
        );
        report.push_str(&performance_line(interpretation.category));
        report
    }
}

impl Default for RuleTechnicalAnalyst {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for RuleTechnicalAnalyst {
    fn role(&self) -> AgentRole {
        AgentRole::Technical
    }

    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    async fn respond(&self, ctx: &RunContext, history: &[Message]) -> Result<Message> {
        match fetched(history, AgentRole::Technical) {
            None => {
                debug!(ticker = %ctx.ticker, "Fetching technical indicators");
                Ok(fetch_request(AgentRole::Technical, TECHNICAL_ANALYSIS_TOOL, ctx))
            }
            Some(result) => Ok(Message::agent(
                AgentRole::Technical,
                Self::assess(&ctx.ticker, result),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use verdict_core::{Directive, ToolCall, ToolFailure, ToolFailureKind, VerdictCategory};

    const AAPL: &str = "Technical analysis for AAPL: {'SMA50': 203.65, 'SMA200': 222.67, \
                        'RSI': 74.8, 'MACD': 1.77}";

    fn ctx() -> RunContext {
        RunContext::new(Uuid::new_v4(), "AAPL").at_turn(5)
    }

    fn history_with(result: impl FnOnce(&ToolCall) -> ToolResult) -> Vec<Message> {
        let call = ToolCall::new("tech_5", TECHNICAL_ANALYSIS_TOOL).with_argument("ticker_symbol", "AAPL");
        let result = result(&call);
        vec![
            Message::task("analyze AAPL"),
            Message::agent(AgentRole::Orchestrator, "TechnicalAnalyst, your view?")
                .with_directive(Directive::Delegate(AgentRole::Technical)),
            Message::agent(AgentRole::Technical, "").with_tool_calls(vec![call]),
            Message::tool(result),
        ]
    }

    #[tokio::test]
    async fn test_fetches_when_delegated() {
        let agent = RuleTechnicalAnalyst::new();
        let history = vec![
            Message::task("analyze AAPL"),
            Message::agent(AgentRole::Orchestrator, "go")
                .with_directive(Directive::Delegate(AgentRole::Technical)),
        ];
        let message = agent.respond(&ctx(), &history).await.unwrap();
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, TECHNICAL_ANALYSIS_TOOL);
    }

    #[tokio::test]
    async fn test_death_cross_and_overbought_is_poor() {
        let agent = RuleTechnicalAnalyst::new();
        let history = history_with(|call| ToolResult::success(call, AAPL));

        let message = agent.respond(&ctx(), &history).await.unwrap();
        assert!(message.content.contains("SMA50 203.65 vs SMA200 222.67: death cross"));
        assert!(message.content.contains("RSI 74.80: overbought"));
        assert!(message.content.contains("MACD 1.77 above zero"));
        assert!(message.content.ends_with("The company performance is POOR"));
        assert_eq!(VerdictCategory::find_in(&message.content), Some(VerdictCategory::Poor));
    }

    #[tokio::test]
    async fn test_structured_payload() {
        let agent = RuleTechnicalAnalyst::new();
        let payload = json!({
            "SMA50": 180.0, "SMA200": 170.0, "RSI": 55.0,
            "MACD": 0.8, "MACD_signal": 0.5, "MACD_hist": 0.3
        });
        let history = history_with(|call| ToolResult::success(call, payload));

        let message = agent.respond(&ctx(), &history).await.unwrap();
        assert!(message.content.contains("golden cross"));
        assert!(message.content.contains("MACD histogram 0.30"));
        assert!(message.content.ends_with("The company performance is STRONG"));
    }

    #[tokio::test]
    async fn test_timeout_reported_as_unavailable() {
        let agent = RuleTechnicalAnalyst::new();
        let history = history_with(|call| {
            ToolResult::failure(call, ToolFailure::new(ToolFailureKind::Timeout, "no answer within 30s"))
        });

        let message = agent.respond(&ctx(), &history).await.unwrap();
        assert!(message.content.starts_with("Technical data for AAPL is unavailable"));
        assert!(message.content.contains("timeout"));
        assert_eq!(VerdictCategory::find_in(&message.content), None);
    }

    #[tokio::test]
    async fn test_error_text_reported_as_unavailable() {
        let agent = RuleTechnicalAnalyst::new();
        let history = history_with(|call| {
            ToolResult::success(call, "Technical analysis for ZZZZ: Error fetching technical analysis: no data")
        });

        let message = agent.respond(&ctx(), &history).await.unwrap();
        assert!(message.content.contains("unavailable"));
        assert!(!message.content.contains("performance is"));
    }
}
