//! Error types for verdict-core

use crate::conversation::ConversationError;
use crate::message::AgentRole;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by an agent while producing a response
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// Agent initialization failed
    #[error("Agent initialization failed: {0}")]
    InitializationFailed(String),

    /// Agent processing failed
    #[error("Agent processing failed: {0}")]
    ProcessingFailed(String),

    /// Generation did not finish in time
    #[error("Agent timed out: {0}")]
    Timeout(String),

    /// The tool gateway cannot serve this agent
    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    /// The agent broke the conversation protocol
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Kind of failure that ended a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunErrorKind {
    /// A tool required by an agent is not registered at the gateway
    ToolUnavailable,
    /// An agent did not produce its turn in time
    Timeout,
    /// Undeclared tool, malformed arguments, premature verdict, ...
    ProtocolViolation,
    /// Turn or wall-clock budget exhausted without a verdict
    MaxTurnsExceeded,
    /// Cancelled by the caller
    Cancelled,
    /// Rejected before the first turn (e.g. empty ticker)
    InvalidInput,
    /// The agent's generation backend failed
    AgentFailure,
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunErrorKind::ToolUnavailable => "tool unavailable",
            RunErrorKind::Timeout => "timeout",
            RunErrorKind::ProtocolViolation => "protocol violation",
            RunErrorKind::MaxTurnsExceeded => "max turns exceeded",
            RunErrorKind::Cancelled => "cancelled",
            RunErrorKind::InvalidInput => "invalid input",
            RunErrorKind::AgentFailure => "agent failure",
        };
        f.write_str(label)
    }
}

/// Caller-facing failure of an analysis run
///
/// Carries enough context (turn, last agent, offending tool) to diagnose the
/// failure without re-running.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("{kind} at turn {turn}: {detail}")]
pub struct RunError {
    pub kind: RunErrorKind,
    pub detail: String,

    /// Turns completed when the run stopped
    pub turn: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_agent: Option<AgentRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

impl RunError {
    pub fn new(kind: RunErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            turn: 0,
            last_agent: None,
            tool: None,
        }
    }

    pub fn protocol_violation(detail: impl Into<String>) -> Self {
        Self::new(RunErrorKind::ProtocolViolation, detail)
    }

    pub fn max_turns_exceeded(detail: impl Into<String>) -> Self {
        Self::new(RunErrorKind::MaxTurnsExceeded, detail)
    }

    pub fn at_turn(mut self, turn: usize) -> Self {
        self.turn = turn;
        self
    }

    pub fn with_agent(mut self, agent: AgentRole) -> Self {
        self.last_agent = Some(agent);
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Fill in turn and agent context if not already set
    pub fn in_context(mut self, turn: usize, agent: Option<AgentRole>) -> Self {
        if self.turn == 0 {
            self.turn = turn;
        }
        if self.last_agent.is_none() {
            self.last_agent = agent;
        }
        self
    }
}

impl From<Error> for RunError {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Timeout(_) => RunErrorKind::Timeout,
            Error::ToolUnavailable(_) => RunErrorKind::ToolUnavailable,
            Error::ProtocolViolation(_) => RunErrorKind::ProtocolViolation,
            Error::Generic(_) | Error::InitializationFailed(_) | Error::ProcessingFailed(_) => {
                RunErrorKind::AgentFailure
            }
        };
        RunError::new(kind, err.to_string())
    }
}

impl From<ConversationError> for RunError {
    fn from(err: ConversationError) -> Self {
        RunError::protocol_violation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_mapping() {
        let err: RunError = Error::Timeout("orchestrator".to_string()).into();
        assert_eq!(err.kind, RunErrorKind::Timeout);

        let err: RunError = Error::ProcessingFailed("HTTP 500".to_string()).into();
        assert_eq!(err.kind, RunErrorKind::AgentFailure);
        assert!(err.detail.contains("HTTP 500"));
    }

    #[test]
    fn test_context_is_preserved() {
        let err = RunError::protocol_violation("undeclared tool")
            .with_tool("news_sentiment_tool")
            .at_turn(3)
            .in_context(9, Some(AgentRole::Technical));

        assert_eq!(err.turn, 3);
        assert_eq!(err.last_agent, Some(AgentRole::Technical));
        assert_eq!(err.tool.as_deref(), Some("news_sentiment_tool"));
        assert_eq!(err.to_string(), "protocol violation at turn 3: undeclared tool");
    }
}
