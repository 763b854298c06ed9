//! Command-line interface for verdict
//!
//! # Usage
//!
//! ```bash
//! # Tool gateway and model credentials
//! export MCP_SERVER_URL="http://localhost:8000"
//! export OPENAI_API_KEY="sk-..."
//!
//! # Analyze one or more tickers
//! cargo run --bin verdict -- --ticker AAPL --ticker MSFT
//!
//! # Without a model
//! cargo run --bin verdict -- --backend rules --ticker TSLA --json
//! ```

use anyhow::Context as _;
use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;
use verdict_core::{Message, Role, RunError, ToolCall, ToolResult};
use verdict_runtime::{AnalysisOutcome, RunObserver};
use verdict_stock::{AgentBackend, StockAnalysisSystem, StockConfig};
use verdict_utils::{AppConfig, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "verdict")]
#[command(about = "STRONG / MIXED / POOR verdicts for stock tickers from a team of analyst agents", long_about = None)]
struct Args {
    /// Model used by the agents
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Tool gateway URL
    #[arg(long, env = "MCP_SERVER_URL", default_value = "http://localhost:8000")]
    server_url: String,

    /// Ticker to analyze, repeat to analyze several concurrently
    #[arg(long = "ticker", default_values_t = vec!["AAPL".to_string()])]
    tickers: Vec<String>,

    /// Agent turns allowed per analysis
    #[arg(long, default_value_t = 12)]
    max_turns: usize,

    /// Per tool call timeout in seconds
    #[arg(long, default_value_t = 30)]
    tool_timeout_secs: u64,

    /// Agent backend: llm or rules
    #[arg(long, default_value = "llm")]
    backend: AgentBackend,

    /// Print verdicts as JSON
    #[arg(long)]
    json: bool,

    /// Suppress system information and progress output
    #[arg(long)]
    quiet: bool,

    /// Log format: pretty or json
    #[arg(long, env = "VERDICT_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

/// Streams run progress to stderr
struct ConsoleObserver;

fn short(run_id: Uuid) -> String {
    run_id.simple().to_string()[..8].to_string()
}

#[async_trait]
impl RunObserver for ConsoleObserver {
    async fn on_message(&self, run_id: Uuid, message: &Message) {
        if message.role == Role::Tool || message.content.trim().is_empty() {
            return;
        }
        let speaker = message
            .author()
            .map_or("task", |agent| agent.display_name());
        eprintln!("[{}] {speaker}: {}\n", short(run_id), message.content.trim());
    }

    async fn on_tool_start(&self, run_id: Uuid, call: &ToolCall) {
        eprintln!("[{}] -> {}({})", short(run_id), call.name, call.arguments_value());
    }

    async fn on_tool_done(&self, run_id: Uuid, result: &ToolResult, elapsed: Duration) {
        let status = if result.is_error() { "failed" } else { "ok" };
        eprintln!(
            "[{}] <- {} {status} in {}ms",
            short(run_id),
            result.tool_name,
            elapsed.as_millis()
        );
    }
}

/// One entry per ticker: transcript and verdict, or the run error
fn json_report(results: &[(String, Result<AnalysisOutcome, RunError>)]) -> Vec<serde_json::Value> {
    results
        .iter()
        .map(|(ticker, result)| match result {
            Ok(outcome) => json!({
                "ticker": ticker,
                "verdict": outcome.verdict,
                "transcript": outcome.transcript,
            }),
            Err(e) => json!({ "ticker": ticker, "error": e }),
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let app = AppConfig::from_env()?;
    verdict_utils::init_tracing(args.log_format.unwrap_or(app.log_format));

    info!(environment = %app.environment, "Starting verdict");

    let config = StockConfig::builder()
        .model(args.model.clone())
        .gateway_url(args.server_url.clone())
        .max_turns(args.max_turns)
        .tool_timeout(Duration::from_secs(args.tool_timeout_secs))
        .backend(args.backend)
        .build()?;

    let progress = !args.quiet && !args.json;
    let mut builder = StockAnalysisSystem::builder().config(config);
    if progress {
        builder = builder.observer(Arc::new(ConsoleObserver));
    }
    let system = builder.build().context(
        "failed to set up the analysis team (the llm backend needs OPENAI_API_KEY, try --backend rules)",
    )?;

    if progress {
        let info = system.system_info();
        println!("Stock Verdict Multi-Agent System");
        println!("{}", "=".repeat(40));
        println!("Backend: {}", info.backend);
        println!("Model: {}", info.model);
        println!("Tool gateway: {}", info.gateway_url);
        println!("Agents: {}", info.agents.join(", "));
        println!("Tickers: {}", args.tickers.join(", "));
        println!("{}", "=".repeat(40));
    }

    let cancel = system.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling analyses");
            cancel.cancel();
        }
    });

    let results = system.analyze_many(&args.tickers).await;
    let failures = results.iter().filter(|(_, result)| result.is_err()).count();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&json_report(&results))?);
    } else {
        for (ticker, result) in &results {
            match result {
                Ok(outcome) => {
                    println!("\nFinal Result for {ticker}:");
                    println!("{}", outcome.verdict.text);
                }
                Err(e) => eprintln!("\nAnalysis of {ticker} failed: {e}"),
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} analyses failed", results.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_core::{AgentRole, RunErrorKind, Verdict, VerdictCategory};

    #[test]
    fn test_json_report_carries_transcript_and_errors() {
        let transcript = vec![
            Message::task("Analyze AAPL"),
            Message::agent(AgentRole::Orchestrator, "FINAL VERDICT: POOR performance"),
        ];
        let verdict = Verdict::new(
            Uuid::new_v4(),
            "AAPL",
            VerdictCategory::Poor,
            "FINAL VERDICT: POOR performance",
            Vec::new(),
            7,
        );
        let results = vec![
            (
                "AAPL".to_string(),
                Ok(AnalysisOutcome { transcript, verdict }),
            ),
            (
                "MSFT".to_string(),
                Err(RunError::new(RunErrorKind::ToolUnavailable, "gateway down")),
            ),
        ];

        let report = json_report(&results);
        assert_eq!(report[0]["verdict"]["category"], "POOR");
        assert_eq!(report[0]["transcript"].as_array().map(Vec::len), Some(2));
        assert_eq!(report[0]["transcript"][0]["content"], "Analyze AAPL");
        assert_eq!(report[1]["ticker"], "MSFT");
        assert!(report[1]["error"]["detail"].is_string());
    }
}
