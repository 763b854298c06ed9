//! Append-only conversation state of a single analysis run

use crate::message::{AgentRole, Message, Role, ToolCall, ToolResult};
use thiserror::Error;
use uuid::Uuid;

/// Violations of the conversation ordering rules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// A non-tool message arrived while tool calls were still unanswered
    #[error("tool calls awaiting results: {}", .0.join(", "))]
    UnansweredToolCalls(Vec<String>),

    /// A tool result does not answer any pending tool call
    #[error("tool result for unknown or already answered call '{0}'")]
    UnexpectedToolResult(String),

    /// A tool message without a back-reference
    #[error("tool result without tool_call_id")]
    MissingToolCallId,
}

/// Ordered history of one run, keyed by `(ticker, run_id)`
///
/// Messages are only ever appended. A message that requests tools must be
/// followed by exactly one tool message per call before anything else is
/// accepted.
#[derive(Debug, Clone)]
pub struct ConversationState {
    run_id: Uuid,
    ticker: String,
    messages: Vec<Message>,
}

impl ConversationState {
    /// Empty conversation
    pub fn new(run_id: Uuid, ticker: impl Into<String>) -> Self {
        Self {
            run_id,
            ticker: ticker.into(),
            messages: Vec::new(),
        }
    }

    /// Conversation seeded with the task message
    pub fn seed(run_id: Uuid, ticker: impl Into<String>, task: impl Into<String>) -> Self {
        let mut state = Self::new(run_id, ticker);
        state.messages.push(Message::task(task));
        state
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a message, enforcing tool-call/tool-result adjacency
    pub fn push(&mut self, message: Message) -> Result<(), ConversationError> {
        let pending: Vec<String> = pending_calls(&self.messages)
            .into_iter()
            .map(|call| call.id.clone())
            .collect();

        if message.role == Role::Tool {
            let id = message
                .tool_call_id
                .as_deref()
                .ok_or(ConversationError::MissingToolCallId)?;
            if !pending.iter().any(|pending_id| pending_id == id) {
                return Err(ConversationError::UnexpectedToolResult(id.to_string()));
            }
        } else if !pending.is_empty() {
            return Err(ConversationError::UnansweredToolCalls(pending));
        }

        self.messages.push(message);
        Ok(())
    }

    /// Tool calls of the latest request that have no result yet
    pub fn pending_tool_calls(&self) -> Vec<&ToolCall> {
        pending_calls(&self.messages)
    }

    /// Latest substantive assessment produced by a role
    pub fn assessment(&self, role: AgentRole) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.author() == Some(role) && message.is_assessment())
    }

    pub fn has_assessment(&self, role: AgentRole) -> bool {
        self.assessment(role).is_some()
    }

    /// Number of times the orchestrator handed the floor to `role`
    pub fn delegations(&self, role: AgentRole) -> usize {
        self.messages
            .iter()
            .filter(|message| message.delegation() == Some(role))
            .count()
    }

    /// Messages since the most recent delegation to `role`
    ///
    /// Returns the whole history when `role` was never delegated to.
    pub fn current_delegation(&self, role: AgentRole) -> &[Message] {
        current_delegation(&self.messages, role)
    }

    /// Results of every tool call issued by `role`
    pub fn tool_results_for(&self, role: AgentRole) -> Vec<&ToolResult> {
        tool_results_for(&self.messages, role)
    }

    /// Whether a tool call of `role`'s latest delegation failed
    ///
    /// Failures from an earlier delegation are superseded by the re-ask.
    pub fn is_degraded(&self, role: AgentRole) -> bool {
        tool_results_for(self.current_delegation(role), role)
            .iter()
            .any(|result| result.is_error())
    }

    /// Consume the state into the final transcript
    pub fn into_transcript(self) -> Vec<Message> {
        self.messages
    }
}

/// Pending calls of the latest tool request in `history`
fn pending_calls(history: &[Message]) -> Vec<&ToolCall> {
    let mut answered: Vec<&str> = Vec::new();

    for message in history.iter().rev() {
        if message.role == Role::Tool {
            if let Some(id) = message.tool_call_id.as_deref() {
                answered.push(id);
            }
            continue;
        }
        return message
            .tool_calls
            .iter()
            .filter(|call| !answered.contains(&call.id.as_str()))
            .collect();
    }

    Vec::new()
}

/// Slice of `history` after the last delegation to `role`
pub fn current_delegation(history: &[Message], role: AgentRole) -> &[Message] {
    history
        .iter()
        .rposition(|message| message.delegation() == Some(role))
        .map_or(history, |index| &history[index + 1..])
}

/// Tool results in `history` that answer calls issued by `role`
pub fn tool_results_for(history: &[Message], role: AgentRole) -> Vec<&ToolResult> {
    let mut issuer = None;
    let mut results = Vec::new();

    for message in history {
        if message.role == Role::Tool {
            if issuer == Some(role) {
                results.extend(message.tool_result.as_ref());
            }
        } else {
            issuer = message.author();
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Directive, ToolFailure, ToolFailureKind};

    fn seeded() -> ConversationState {
        ConversationState::seed(Uuid::new_v4(), "AAPL", "Analyze AAPL")
    }

    fn request(role: AgentRole, ids: &[&str]) -> Message {
        let calls = ids
            .iter()
            .map(|id| ToolCall::new(*id, "technical_analysis_tool"))
            .collect();
        Message::agent(role, "").with_tool_calls(calls)
    }

    #[test]
    fn test_seed() {
        let state = seeded();
        assert_eq!(state.len(), 1);
        assert_eq!(state.ticker(), "AAPL");
        assert_eq!(state.messages()[0].role, Role::User);
    }

    #[test]
    fn test_tool_results_must_follow_requests() {
        let mut state = seeded();
        state.push(request(AgentRole::Technical, &["a", "b"])).unwrap();
        assert_eq!(state.pending_tool_calls().len(), 2);

        let err = state
            .push(Message::agent(AgentRole::Technical, "too early"))
            .unwrap_err();
        assert_eq!(
            err,
            ConversationError::UnansweredToolCalls(vec!["a".to_string(), "b".to_string()])
        );

        let call_b = ToolCall::new("b", "technical_analysis_tool");
        state.push(Message::tool(ToolResult::success(&call_b, "ok"))).unwrap();
        assert_eq!(state.pending_tool_calls().len(), 1);

        // Answering the same call twice is rejected
        let err = state
            .push(Message::tool(ToolResult::success(&call_b, "again")))
            .unwrap_err();
        assert_eq!(err, ConversationError::UnexpectedToolResult("b".to_string()));

        let call_a = ToolCall::new("a", "technical_analysis_tool");
        state.push(Message::tool(ToolResult::success(&call_a, "ok"))).unwrap();
        assert!(state.pending_tool_calls().is_empty());

        state
            .push(Message::agent(AgentRole::Technical, "The company performance is POOR"))
            .unwrap();
        assert!(state.has_assessment(AgentRole::Technical));
    }

    #[test]
    fn test_stray_tool_result_rejected() {
        let mut state = seeded();
        let call = ToolCall::new("ghost", "news_sentiment_tool");
        assert!(state.push(Message::tool(ToolResult::success(&call, "x"))).is_err());
    }

    #[test]
    fn test_delegation_tracking() {
        let mut state = seeded();
        state
            .push(
                Message::agent(AgentRole::Orchestrator, "SentimentAnalyst, please start")
                    .with_directive(Directive::Delegate(AgentRole::Sentiment)),
            )
            .unwrap();
        state.push(request(AgentRole::Sentiment, &["s1"])).unwrap();

        assert_eq!(state.delegations(AgentRole::Sentiment), 1);
        assert_eq!(state.delegations(AgentRole::Technical), 0);
        assert_eq!(state.current_delegation(AgentRole::Sentiment).len(), 1);
        assert_eq!(state.current_delegation(AgentRole::Technical).len(), 3);
        assert!(!state.has_assessment(AgentRole::Sentiment));
    }

    #[test]
    fn test_degradation_is_attributed_to_issuer() {
        let mut state = seeded();
        state.push(request(AgentRole::Technical, &["t1"])).unwrap();
        let call = ToolCall::new("t1", "technical_analysis_tool");
        state
            .push(Message::tool(ToolResult::failure(
                &call,
                ToolFailure::new(ToolFailureKind::Timeout, "no answer within 30s"),
            )))
            .unwrap();

        assert!(state.is_degraded(AgentRole::Technical));
        assert!(!state.is_degraded(AgentRole::Sentiment));
        assert_eq!(state.tool_results_for(AgentRole::Technical).len(), 1);
    }

    #[test]
    fn test_successful_re_ask_clears_degradation() {
        let mut state = seeded();
        let call = ToolCall::new("t1", "technical_analysis_tool");
        let retry = ToolCall::new("t2", "technical_analysis_tool");
        let delegate = || {
            Message::agent(AgentRole::Orchestrator, "TechnicalAnalyst, your view please")
                .with_directive(Directive::Delegate(AgentRole::Technical))
        };

        state.push(delegate()).unwrap();
        state.push(request(AgentRole::Technical, &["t1"])).unwrap();
        state
            .push(Message::tool(ToolResult::failure(
                &call,
                ToolFailure::new(ToolFailureKind::Unavailable, "connection refused"),
            )))
            .unwrap();
        state
            .push(Message::agent(AgentRole::Technical, "Technical data is unavailable"))
            .unwrap();
        assert!(state.is_degraded(AgentRole::Technical));

        state.push(delegate()).unwrap();
        state.push(request(AgentRole::Technical, &["t2"])).unwrap();
        state
            .push(Message::tool(ToolResult::success(&retry, "RSI 55.1")))
            .unwrap();

        assert!(!state.is_degraded(AgentRole::Technical));
        assert_eq!(state.tool_results_for(AgentRole::Technical).len(), 2);
    }
}
