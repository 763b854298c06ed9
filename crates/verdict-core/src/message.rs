//! Conversation messages exchanged between agents during a run

use crate::verdict::VerdictCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Agents that can take a turn in an analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Drives the conversation and produces the final verdict
    Orchestrator,
    /// News sentiment specialist
    Sentiment,
    /// Technical indicator specialist
    Technical,
}

impl AgentRole {
    /// Specialists the orchestrator must hear from before concluding
    pub const SPECIALISTS: [AgentRole; 2] = [AgentRole::Sentiment, AgentRole::Technical];

    /// Whether this role is a specialist
    pub fn is_specialist(self) -> bool {
        !matches!(self, AgentRole::Orchestrator)
    }

    /// Conversational name used in prompts and transcripts
    pub fn display_name(self) -> &'static str {
        match self {
            AgentRole::Orchestrator => "Orchestrator",
            AgentRole::Sentiment => "SentimentAnalyst",
            AgentRole::Technical => "TechnicalAnalyst",
        }
    }

    /// Resolve a role from either its wire name or its display name
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "orchestrator" => Some(AgentRole::Orchestrator),
            "sentiment" | "sentimentanalyst" | "sentiment_analyst" => Some(AgentRole::Sentiment),
            "technical" | "technicalanalyst" | "technical_analyst" => Some(AgentRole::Technical),
            _ => None,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Author of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The caller that seeded the task
    User,
    Orchestrator,
    Sentiment,
    Technical,
    /// A tool result produced by the bridge
    Tool,
}

impl Role {
    /// The agent behind this role, if any
    pub fn agent(self) -> Option<AgentRole> {
        match self {
            Role::Orchestrator => Some(AgentRole::Orchestrator),
            Role::Sentiment => Some(AgentRole::Sentiment),
            Role::Technical => Some(AgentRole::Technical),
            Role::User | Role::Tool => None,
        }
    }
}

impl From<AgentRole> for Role {
    fn from(role: AgentRole) -> Self {
        match role {
            AgentRole::Orchestrator => Role::Orchestrator,
            AgentRole::Sentiment => Role::Sentiment,
            AgentRole::Technical => Role::Technical,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("User"),
            Role::Tool => f.write_str("Tool"),
            Role::Orchestrator => f.write_str(AgentRole::Orchestrator.display_name()),
            Role::Sentiment => f.write_str(AgentRole::Sentiment.display_name()),
            Role::Technical => f.write_str(AgentRole::Technical.display_name()),
        }
    }
}

/// A structured request to execute a named tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier the matching tool result refers back to
    pub id: String,

    /// Tool name, must be declared by the issuing agent
    pub name: String,

    /// Named arguments
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: Map::new(),
        }
    }

    /// Add a named argument
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Arguments as a JSON object value
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// Classification of a failed tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    /// No response within the per-call timeout
    Timeout,
    /// Gateway unreachable or the session could not be used
    Unavailable,
    /// The gateway answered with something we could not decode
    MalformedResponse,
    /// The tool itself reported a failure (e.g. unknown ticker)
    ToolError,
}

impl fmt::Display for ToolFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolFailureKind::Timeout => "timeout",
            ToolFailureKind::Unavailable => "unavailable",
            ToolFailureKind::MalformedResponse => "malformed response",
            ToolFailureKind::ToolError => "tool error",
        };
        f.write_str(label)
    }
}

/// Failure details attached to a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ToolFailureKind,

    /// Error code reported by the gateway, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,

    pub message: String,
}

impl ToolFailure {
    pub fn new(kind: ToolFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Outcome of one tool call, as folded back into the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,

    /// Text or structured payload returned by the tool
    #[serde(default)]
    pub content: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

impl ToolResult {
    /// Successful result for a call
    pub fn success(call: &ToolCall, content: impl Into<Value>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: content.into(),
            error: None,
        }
    }

    /// Failed result for a call
    pub fn failure(call: &ToolCall, error: ToolFailure) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: Value::Null,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Payload as plain text
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Text shown to agents for this result
    pub fn render(&self) -> String {
        match &self.error {
            Some(error) => format!("Error calling {}: {}", self.tool_name, error),
            None => self.content_text(),
        }
    }
}

/// Structured control signal carried by an agent message
///
/// Only the orchestrator may attach one. `Conclude` is the completion signal
/// the coordination loop terminates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    /// Hand the floor to a specialist
    Delegate(AgentRole),
    /// End the run with the given verdict category
    Conclude(VerdictCategory),
}

/// A single entry of the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    #[serde(default)]
    pub content: String,

    /// Tool calls requested by this message, executed by the bridge
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Back-reference for tool result messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<Directive>,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_result: None,
            directive: None,
            timestamp: Utc::now(),
        }
    }

    /// Task message that seeds a run
    pub fn task(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Content message authored by an agent
    pub fn agent(role: AgentRole, content: impl Into<String>) -> Self {
        Self::with_role(role.into(), content)
    }

    /// Tool result message answering a previous tool call
    pub fn tool(result: ToolResult) -> Self {
        let mut message = Self::with_role(Role::Tool, result.render());
        message.tool_call_id = Some(result.tool_call_id.clone());
        message.tool_result = Some(result);
        message
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directive = Some(directive);
        self
    }

    /// The agent that authored this message
    pub fn author(&self) -> Option<AgentRole> {
        self.role.agent()
    }

    /// Whether this message asks the bridge to run tools
    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// A substantive agent message: content, no pending tool calls
    pub fn is_assessment(&self) -> bool {
        self.author().is_some() && !self.requests_tools() && !self.content.trim().is_empty()
    }

    /// The verdict category this message concludes with, if any
    pub fn conclusion(&self) -> Option<VerdictCategory> {
        match self.directive {
            Some(Directive::Conclude(category)) => Some(category),
            _ => None,
        }
    }

    /// The specialist this message delegates to, if any
    pub fn delegation(&self) -> Option<AgentRole> {
        match self.directive {
            Some(Directive::Delegate(role)) => Some(role),
            _ => None,
        }
    }
}
