//! News sentiment analyst

use super::{fetch_request, fetched, performance_line};
use crate::config::StockConfig;
use crate::prompts;
use crate::tools::{NEWS_SENTIMENT_TOOL, tools_for};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;
use verdict_core::{Agent, AgentRole, Message, Result, RunContext, ToolSpec, VerdictCategory};
use verdict_llm::LLMProvider;
use verdict_runtime::LlmAgent;

const POSITIVE_STEMS: &[&str] = &[
    "beat", "surge", "soar", "gain", "rall", "record", "upgrade", "growth", "strong", "rise",
    "jump", "outperform", "bullish", "profit", "boost", "optimis", "expand",
];

const NEGATIVE_STEMS: &[&str] = &[
    "miss", "fall", "drop", "plunge", "slump", "downgrade", "lawsuit", "probe", "weak",
    "decline", "loss", "bearish", "concern", "tariff", "sink", "slide", "warn", "layoff",
    "pessimis", "recall",
];

const NO_NEWS: &str = "No recent news available";
const FETCH_ERROR: &str = "Error fetching";

/// LLM-backed sentiment analyst declaring the news tool
pub fn llm_sentiment_analyst(provider: Arc<dyn LLMProvider>, config: &StockConfig) -> LlmAgent {
    LlmAgent::new(
        AgentRole::Sentiment,
        provider,
        config.llm_config(prompts::SENTIMENT_ANALYST),
    )
    .with_tools(tools_for(AgentRole::Sentiment))
}

/// Tone of a single article
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Negative,
    Neutral,
}

/// Classify an article by counting positive and negative keywords
pub fn classify(article: &str) -> Tone {
    let lower = article.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();

    let count = |stems: &[&str]| {
        words
            .iter()
            .filter(|word| stems.iter().any(|stem| word.starts_with(stem)))
            .count()
    };
    let positive = count(POSITIVE_STEMS);
    let negative = count(NEGATIVE_STEMS);

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Tone::Positive,
        std::cmp::Ordering::Less => Tone::Negative,
        std::cmp::Ordering::Equal => Tone::Neutral,
    }
}

/// Split a news tool payload into articles
///
/// Accepts a JSON array of strings or the text form
/// `News sentiment analysis for AAPL: ['Article #1. title - summary', ...]`.
pub fn articles(content: &Value) -> Vec<String> {
    match content {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(clean_article)
            .filter(|article| !article.is_empty())
            .collect(),
        Value::String(text) => text
            .split("Article #")
            .skip(1)
            .map(clean_article)
            .filter(|article| !article.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn clean_article(text: &str) -> String {
    let text = text.trim().trim_start_matches("Article #");
    let text = text.trim_start_matches(|c: char| c.is_ascii_digit());
    let text = text.strip_prefix('.').unwrap_or(text);
    text.trim_start_matches(is_list_punctuation)
        .trim_end_matches(is_list_punctuation)
        .to_string()
}

fn is_list_punctuation(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '[' | ']' | '\'' | '"')
}

/// Sentiment counts over a set of articles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentimentTally {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub neutral: usize,
}

impl SentimentTally {
    pub fn from_articles(articles: &[String]) -> Self {
        let mut tally = Self::default();
        for article in articles {
            match classify(article) {
                Tone::Positive => tally.positive.push(article.clone()),
                Tone::Negative => tally.negative.push(article.clone()),
                Tone::Neutral => tally.neutral += 1,
            }
        }
        tally
    }

    pub fn total(&self) -> usize {
        self.positive.len() + self.negative.len() + self.neutral
    }

    /// More positive than negative articles is strong, the reverse is poor
    pub fn category(&self) -> VerdictCategory {
        let net = self.positive.len() as i32 - self.negative.len() as i32;
        VerdictCategory::from_score(net)
    }
}

/// Rule-based sentiment analyst
///
/// Fetches the news once per delegation and grades it by keyword counts.
#[derive(Debug)]
pub struct RuleSentimentAnalyst {
    tools: Vec<ToolSpec>,
}

impl RuleSentimentAnalyst {
    pub fn new() -> Self {
        Self {
            tools: tools_for(AgentRole::Sentiment),
        }
    }

    fn assess(ticker: &str, content: &Value) -> String {
        let text = match content {
            Value::String(text) => text.as_str(),
            _ => "",
        };
        if text.contains(NO_NEWS) {
            return format!(
                "No recent news is available for {ticker}, so news sentiment is unavailable for this run."
            );
        }
        if text.contains(FETCH_ERROR) {
            return format!("News data for {ticker} is unavailable: {}", text.trim());
        }

        let articles = articles(content);
        if articles.is_empty() {
            return format!(
                "News data for {ticker} is unavailable: the news tool returned no articles."
            );
        }

        let tally = SentimentTally::from_articles(&articles);
        let category = tally.category();

        let mut report = format!(
            "News sentiment for {ticker} across {} articles: {} positive, {} negative, {} neutral.\n",
            tally.total(),
            tally.positive.len(),
            tally.negative.len(),
            tally.neutral
        );
        for article in &tally.positive {
            let _ = writeln!(report, "+ {article}");
        }
        for article in &tally.negative {
            let _ = writeln!(report, "- {article}");
        }
        let reasoning = match category {
            VerdictCategory::Strong => "Positive coverage outweighs negative coverage.",
            VerdictCategory::Poor => "Negative coverage outweighs positive coverage.",
            VerdictCategory::Mixed => "Positive and negative coverage balance out.",
        };
        let _ = writeln!(report, "{reasoning}");
        report.push_str(&performance_line(category));
        report
    }
}

impl Default for RuleSentimentAnalyst {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for RuleSentimentAnalyst {
    fn role(&self) -> AgentRole {
        AgentRole::Sentiment
    }

    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    async fn respond(&self, ctx: &RunContext, history: &[Message]) -> Result<Message> {
        let Some(result) = fetched(history, AgentRole::Sentiment) else {
            debug!(ticker = %ctx.ticker, "Fetching news");
            return Ok(fetch_request(AgentRole::Sentiment, NEWS_SENTIMENT_TOOL, ctx));
        };

        let content = if result.is_error() {
            format!("News data for {} is unavailable: {}", ctx.ticker, result.render())
        } else {
            Self::assess(&ctx.ticker, &result.content)
        };
        Ok(Message::agent(AgentRole::Sentiment, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use verdict_core::{Directive, ToolCall, ToolFailure, ToolFailureKind, ToolResult};

    const NEWS: &str = "News sentiment analysis for AAPL: ['Article #1. Apple shares surge to \
                        record high - Strong iPhone demand', 'Article #2. Regulators open probe \
                        into App Store - Analysts warn of fines', 'Article #3. Apple hosts \
                        developer conference - Event scheduled for June']";

    fn ctx(turn: usize) -> RunContext {
        RunContext::new(Uuid::new_v4(), "AAPL").at_turn(turn)
    }

    fn delegated() -> Vec<Message> {
        vec![
            Message::task("analyze AAPL"),
            Message::agent(AgentRole::Orchestrator, "SentimentAnalyst, your view?")
                .with_directive(Directive::Delegate(AgentRole::Sentiment)),
        ]
    }

    fn with_result(result: impl FnOnce(&ToolCall) -> ToolResult) -> Vec<Message> {
        let call = ToolCall::new("news_1", NEWS_SENTIMENT_TOOL).with_argument("ticker_symbol", "AAPL");
        let result = result(&call);
        let mut history = delegated();
        history.push(Message::agent(AgentRole::Sentiment, "").with_tool_calls(vec![call]));
        history.push(Message::tool(result));
        history
    }

    #[test]
    fn test_articles_from_text() {
        let articles = articles(&json!(NEWS));
        assert_eq!(articles.len(), 3);
        assert!(articles[0].starts_with("Apple shares surge"));
        assert!(articles[2].ends_with("June"));
    }

    #[test]
    fn test_articles_from_array() {
        let articles = articles(&json!(["Article #1. Up - ok", "", "Article #2. Down - meh"]));
        assert_eq!(articles, vec!["Up - ok", "Down - meh"]);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("Apple shares surge to record high"), Tone::Positive);
        assert_eq!(classify("Regulators open probe, analysts warn"), Tone::Negative);
        assert_eq!(classify("Apple hosts developer conference"), Tone::Neutral);
    }

    #[test]
    fn test_tally_balanced_is_mixed() {
        let tally = SentimentTally::from_articles(&articles(&json!(NEWS)));
        assert_eq!(tally.positive.len(), 1);
        assert_eq!(tally.negative.len(), 1);
        assert_eq!(tally.neutral, 1);
        assert_eq!(tally.category(), VerdictCategory::Mixed);
    }

    #[tokio::test]
    async fn test_first_turn_fetches_news() {
        let agent = RuleSentimentAnalyst::new();
        let message = agent.respond(&ctx(2), &delegated()).await.unwrap();

        assert!(message.requests_tools());
        assert_eq!(message.tool_calls[0].name, NEWS_SENTIMENT_TOOL);
        assert_eq!(message.tool_calls[0].arguments["ticker_symbol"], "AAPL");
    }

    #[tokio::test]
    async fn test_assessment_ends_with_category() {
        let agent = RuleSentimentAnalyst::new();
        let history = with_result(|call| ToolResult::success(call, NEWS));

        let message = agent.respond(&ctx(3), &history).await.unwrap();
        assert!(message.is_assessment());
        assert!(message.content.contains("3 articles: 1 positive, 1 negative, 1 neutral"));
        assert!(message.content.ends_with("The company performance is MIXED"));
        assert_eq!(VerdictCategory::find_in(&message.content), Some(VerdictCategory::Mixed));
    }

    #[tokio::test]
    async fn test_tool_failure_reported_as_unavailable() {
        let agent = RuleSentimentAnalyst::new();
        let history = with_result(|call| {
            ToolResult::failure(call, ToolFailure::new(ToolFailureKind::Timeout, "no answer in 30s"))
        });

        let message = agent.respond(&ctx(3), &history).await.unwrap();
        assert!(message.content.contains("unavailable"));
        assert_eq!(VerdictCategory::find_in(&message.content), None);
    }

    #[tokio::test]
    async fn test_no_news_reported_as_unavailable() {
        let agent = RuleSentimentAnalyst::new();
        let history = with_result(|call| {
            ToolResult::success(call, "News sentiment analysis for AAPL: No recent news available for this ticker.")
        });

        let message = agent.respond(&ctx(3), &history).await.unwrap();
        assert!(message.content.contains("unavailable"));
        assert!(!message.content.contains("performance is"));
    }
}
