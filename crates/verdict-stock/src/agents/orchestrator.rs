//! Orchestrator
//!
//! Consults the sentiment analyst, then the technical analyst, and
//! synthesizes their assessments into the final verdict.

use crate::config::StockConfig;
use crate::prompts;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;
use verdict_core::conversation::tool_results_for;
use verdict_core::{
    Agent, AgentRole, Directive, Message, Result, RunContext, Verdict, VerdictCategory,
};
use verdict_llm::LLMProvider;
use verdict_runtime::LlmAgent;

/// Opening line of every synthesis
pub const SUMMARY_HEADER: &str =
    "Here is a summary of the inputs from the Sentiment and Technical Analysts:";

/// LLM-backed orchestrator; it declares no gateway tools
pub fn llm_orchestrator(provider: Arc<dyn LLMProvider>, config: &StockConfig) -> LlmAgent {
    LlmAgent::new(
        AgentRole::Orchestrator,
        provider,
        config.llm_config(prompts::ORCHESTRATOR),
    )
}

/// What a specialist contributed so far
#[derive(Debug, Clone, PartialEq)]
enum Input<'a> {
    /// Never consulted
    Missing,
    /// Assessment ending with a category
    Judged(&'a str, VerdictCategory),
    /// The specialist could not get its data
    Unavailable(&'a str),
    /// Assessment without a category
    Unjudged(&'a str),
}

fn input_from(history: &[Message], role: AgentRole) -> Input<'_> {
    let Some(assessment) = history
        .iter()
        .rev()
        .find(|message| message.author() == Some(role) && message.is_assessment())
    else {
        return Input::Missing;
    };

    let text = assessment.content.trim();
    let fetch_failed = tool_results_for(history, role)
        .last()
        .is_some_and(|result| result.is_error());

    match VerdictCategory::find_in(text) {
        Some(category) if !fetch_failed => Input::Judged(text, category),
        _ if fetch_failed || text.to_ascii_lowercase().contains("unavailable") => {
            Input::Unavailable(text)
        }
        _ => Input::Unjudged(text),
    }
}

fn delegations(history: &[Message], role: AgentRole) -> usize {
    history
        .iter()
        .filter(|message| message.delegation() == Some(role))
        .count()
}

fn data_label(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Technical => "technical",
        _ => "sentiment",
    }
}

/// Rule-based orchestrator
///
/// Asks each specialist in turn, re-asks while an assessment carries no
/// category and the delegation limit allows it, and concludes with the
/// combined category of the available assessments. When no specialist could
/// get its data the verdict is MIXED.
#[derive(Debug)]
pub struct RuleOrchestrator {
    max_delegations: usize,
}

impl Default for RuleOrchestrator {
    fn default() -> Self {
        Self { max_delegations: 2 }
    }
}

impl RuleOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegations allowed per specialist; must match the loop's limit
    pub fn with_max_delegations(mut self, max_delegations: usize) -> Self {
        self.max_delegations = max_delegations;
        self
    }

    fn synthesize(ticker: &str, inputs: &[(AgentRole, Input<'_>)]) -> (VerdictCategory, String) {
        let mut text = format!("{SUMMARY_HEADER}\n");
        let mut score = 0;
        let mut judged = Vec::new();
        let mut unavailable = Vec::new();

        for (role, input) in inputs {
            let name = role.display_name();
            match input {
                Input::Judged(assessment, category) => {
                    score += category.score();
                    judged.push(format!("{} {category}", data_label(*role)));
                    let _ = write!(text, "\n{name} ({category}):\n{assessment}\n");
                }
                Input::Unavailable(assessment) => {
                    unavailable.push(*role);
                    let _ = write!(text, "\n{name} (no judgment):\n{assessment}\n");
                }
                Input::Unjudged(assessment) => {
                    let _ = write!(
                        text,
                        "\n{name} (no judgment given):\n{assessment}\n"
                    );
                }
                Input::Missing => {}
            }
        }

        let category = VerdictCategory::from_score(score);
        text.push('\n');
        for role in &unavailable {
            let _ = writeln!(
                text,
                "Note: {} data was unavailable for this run.",
                data_label(*role)
            );
        }

        if judged.is_empty() {
            let _ = writeln!(
                text,
                "No analyst could support a judgment on {ticker}, so the verdict defaults to {category}."
            );
        } else {
            let _ = writeln!(
                text,
                "Combined, {} point to {category} performance for {ticker}.",
                judged.join(" and ")
            );
        }

        text.push('\n');
        text.push_str(&Verdict::marker_line(category));
        (category, text)
    }
}

#[async_trait]
impl Agent for RuleOrchestrator {
    fn role(&self) -> AgentRole {
        AgentRole::Orchestrator
    }

    async fn respond(&self, ctx: &RunContext, history: &[Message]) -> Result<Message> {
        let mut inputs = Vec::with_capacity(AgentRole::SPECIALISTS.len());

        for role in AgentRole::SPECIALISTS {
            let input = input_from(history, role);
            let name = role.display_name();
            match input {
                Input::Missing => {
                    debug!(specialist = %role, "Delegating");
                    return Ok(Message::agent(
                        AgentRole::Orchestrator,
                        format!(
                            "{name}, please provide your {} analysis for {} and finish with your judgment of the company's performance.",
                            data_label(role),
                            ctx.ticker
                        ),
                    )
                    .with_directive(Directive::Delegate(role)));
                }
                Input::Unjudged(_) if delegations(history, role) < self.max_delegations => {
                    debug!(specialist = %role, "Asking again for a judgment");
                    return Ok(Message::agent(
                        AgentRole::Orchestrator,
                        format!(
                            "{name}, you did not say whether the company performance is strong, mixed or poor. Please state your judgment."
                        ),
                    )
                    .with_directive(Directive::Delegate(role)));
                }
                _ => inputs.push((role, input)),
            }
        }

        let (category, text) = Self::synthesize(&ctx.ticker, &inputs);
        Ok(Message::agent(AgentRole::Orchestrator, text).with_directive(Directive::Conclude(category)))
    }
}
