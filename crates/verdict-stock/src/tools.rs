//! Gateway tools used by the specialists
//!
//! Each specialist declares exactly one tool. Both take a single
//! `ticker_symbol` string argument.

use serde_json::json;
use verdict_core::{AgentRole, ToolSpec};
use verdict_gateway::schema::{object, string};

/// Tool returning recent news articles for a ticker
pub const NEWS_SENTIMENT_TOOL: &str = "news_sentiment_tool";

/// Tool returning SMA50, SMA200, RSI and MACD readings for a ticker
pub const TECHNICAL_ANALYSIS_TOOL: &str = "technical_analysis_tool";

/// Argument every stock tool takes
pub const TICKER_ARGUMENT: &str = "ticker_symbol";

fn ticker_schema() -> serde_json::Value {
    object(
        json!({
            TICKER_ARGUMENT: string(Some("Stock ticker symbol (e.g., 'AAPL', 'MSFT')"))
        }),
        vec![TICKER_ARGUMENT],
    )
}

pub fn news_sentiment_spec() -> ToolSpec {
    ToolSpec::new(
        NEWS_SENTIMENT_TOOL,
        "Fetch recent news articles for a given stock ticker",
        ticker_schema(),
    )
}

pub fn technical_analysis_spec() -> ToolSpec {
    ToolSpec::new(
        TECHNICAL_ANALYSIS_TOOL,
        "Fetch technical indicators (SMA50, SMA200, RSI, MACD) for a given stock ticker",
        ticker_schema(),
    )
}

/// Tools declared by a role; the orchestrator declares none
pub fn tools_for(role: AgentRole) -> Vec<ToolSpec> {
    match role {
        AgentRole::Sentiment => vec![news_sentiment_spec()],
        AgentRole::Technical => vec![technical_analysis_spec()],
        AgentRole::Orchestrator => Vec::new(),
    }
}
