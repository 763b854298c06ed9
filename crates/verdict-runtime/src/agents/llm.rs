//! LLM-backed agent
//!
//! Renders the shared conversation from the agent's own point of view, asks
//! the provider for the next message and converts the reply back into the
//! conversation model. The orchestrator additionally gets two control tools
//! whose calls become [`Directive`]s instead of gateway calls.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};
use verdict_core::{
    Agent, AgentRole, Directive, Error, Message, Result, Role, RunContext, ToolCall, ToolSpec,
    VerdictCategory,
};
use verdict_gateway::schema::{enum_string, object};
use verdict_llm::{
    CompletionRequest, LLMProvider, Message as LlmMessage, StopReason, ToolDefinition, ToolUse,
};

/// Control tool the orchestrator calls to hand the floor to a specialist
pub const DELEGATE_TOOL: &str = "delegate_to_specialist";

/// Control tool the orchestrator calls to conclude the run
pub const CONCLUDE_TOOL: &str = "submit_final_verdict";

/// Configuration for an LLM agent
#[derive(Debug, Clone)]
pub struct LlmAgentConfig {
    /// Model to use
    pub model: String,

    /// System prompt
    pub system_prompt: String,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature for sampling
    pub temperature: f32,
}

impl Default for LlmAgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            max_tokens: 2048,
            temperature: 0.2,
        }
    }
}

/// Agent whose turns are generated by an [`LLMProvider`]
pub struct LlmAgent {
    role: AgentRole,
    provider: Arc<dyn LLMProvider>,
    config: LlmAgentConfig,
    tools: Vec<ToolSpec>,
}

impl LlmAgent {
    pub fn new(role: AgentRole, provider: Arc<dyn LLMProvider>, config: LlmAgentConfig) -> Self {
        Self {
            role,
            provider,
            config,
            tools: Vec::new(),
        }
    }

    /// Declare the gateway tools this agent may call
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn config(&self) -> &LlmAgentConfig {
        &self.config
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .iter()
            .map(|spec| {
                ToolDefinition::new(&spec.name, &spec.description, spec.input_schema.clone())
            })
            .collect();

        if self.role == AgentRole::Orchestrator {
            definitions.extend(directive_tools());
        }
        definitions
    }

    /// The conversation as this agent sees it
    ///
    /// Own messages are assistant turns, peer assessments are named user
    /// turns, and tool traffic of other agents is left out.
    fn render_history(&self, history: &[Message]) -> Vec<LlmMessage> {
        let mut rendered = Vec::new();
        let mut issuer = None;

        for message in history {
            match message.role {
                Role::User => {
                    issuer = None;
                    rendered.push(LlmMessage::user(&message.content));
                }
                Role::Tool => {
                    if issuer != Some(self.role) {
                        continue;
                    }
                    if let Some(id) = message.tool_call_id.as_deref() {
                        rendered.push(LlmMessage::tool_result(id, &message.content));
                    }
                }
                _ => {
                    issuer = message.author();
                    if issuer == Some(self.role) {
                        rendered.push(render_own(message));
                    } else if message.is_assessment() {
                        let speaker = issuer.map_or("Agent", AgentRole::display_name);
                        rendered.push(LlmMessage::user(&message.content).with_name(speaker));
                    }
                }
            }
        }

        rendered
    }

    /// Convert the provider reply into a conversation message
    fn interpret(&self, reply: &LlmMessage) -> Result<Message> {
        let content = reply.text().unwrap_or_default().to_string();
        let (control, calls): (Vec<&ToolUse>, Vec<&ToolUse>) = reply
            .tool_calls
            .iter()
            .partition(|call| is_directive_tool(&call.name) && self.role == AgentRole::Orchestrator);

        if !calls.is_empty() {
            if !control.is_empty() {
                warn!(agent = %self.role, "Control tool requested alongside gateway tools, ignoring it");
            }
            let calls = calls.into_iter().map(to_tool_call).collect();
            return Ok(Message::agent(self.role, content).with_tool_calls(calls));
        }

        let directive = match control.last() {
            Some(call) => Some(parse_directive(call)?),
            None if self.role == AgentRole::Orchestrator => {
                VerdictCategory::from_marker(&content).map(Directive::Conclude)
            }
            None => None,
        };

        let message = Message::agent(self.role, content);
        Ok(match directive {
            Some(directive) => message.with_directive(directive),
            None => message,
        })
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    async fn respond(&self, ctx: &RunContext, history: &[Message]) -> Result<Message> {
        let messages = self.render_history(history);
        let tools = self.tool_definitions();
        debug!(
            agent = %self.role,
            turn = ctx.turn,
            message_count = messages.len(),
            tool_count = tools.len(),
            "Rendering agent turn"
        );

        let mut request = CompletionRequest::builder(&self.config.model)
            .messages(messages)
            .system(self.config.system_prompt.clone())
            .max_tokens(self.config.max_tokens)
            .temperature(self.config.temperature);

        if !tools.is_empty() {
            request = request.tools(tools);
        }

        let response = self
            .provider
            .complete(request.build())
            .await
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

        info!(
            agent = %self.role,
            ticker = %ctx.ticker,
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "LLM response received"
        );

        if response.stop_reason == StopReason::MaxTokens {
            warn!(agent = %self.role, "Response truncated due to token limit");
        }

        self.interpret(&response.message)
    }
}

fn render_own(message: &Message) -> LlmMessage {
    if message.requests_tools() {
        let content = (!message.content.is_empty()).then(|| message.content.clone());
        let calls = message
            .tool_calls
            .iter()
            .map(|call| ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.arguments_value(),
            })
            .collect();
        return LlmMessage::assistant_with_tools(content, calls);
    }

    let note = match message.directive {
        Some(Directive::Delegate(role)) => format!("[handed over to {role}]"),
        Some(Directive::Conclude(category)) => format!("[concluded: {category}]"),
        None => return LlmMessage::assistant(&message.content),
    };

    if message.content.trim().is_empty() {
        LlmMessage::assistant(note)
    } else {
        LlmMessage::assistant(format!("{}\n{note}", message.content))
    }
}

fn directive_tools() -> Vec<ToolDefinition> {
    let specialists: Vec<&str> = AgentRole::SPECIALISTS
        .iter()
        .map(|role| role.display_name())
        .collect();
    let categories: Vec<&str> = VerdictCategory::ALL.iter().map(|c| c.as_str()).collect();

    vec![
        ToolDefinition::new(
            DELEGATE_TOOL,
            "Hand the conversation to a specialist analyst for their assessment",
            object(
                json!({ "specialist": enum_string(&specialists, Some("Specialist to consult")) }),
                vec!["specialist"],
            ),
        ),
        ToolDefinition::new(
            CONCLUDE_TOOL,
            "Submit the final verdict once every specialist has reported",
            object(
                json!({ "category": enum_string(&categories, Some("Overall performance")) }),
                vec!["category"],
            ),
        ),
    ]
}

fn is_directive_tool(name: &str) -> bool {
    name == DELEGATE_TOOL || name == CONCLUDE_TOOL
}

fn parse_directive(call: &ToolUse) -> Result<Directive> {
    let field = |key: &str| call.input.get(key).and_then(Value::as_str).unwrap_or_default();

    if call.name == DELEGATE_TOOL {
        let name = field("specialist");
        match AgentRole::from_name(name) {
            Some(role) if role.is_specialist() => Ok(Directive::Delegate(role)),
            _ => Err(Error::ProtocolViolation(format!(
                "{DELEGATE_TOOL}: unknown specialist '{name}'"
            ))),
        }
    } else {
        let category = field("category");
        category
            .parse()
            .map(Directive::Conclude)
            .map_err(|e| Error::ProtocolViolation(format!("{CONCLUDE_TOOL}: {e}")))
    }
}

fn to_tool_call(call: &ToolUse) -> ToolCall {
    ToolCall {
        id: call.id.clone(),
        name: call.name.clone(),
        arguments: call.input.as_object().cloned().unwrap_or_default(),
    }
}
