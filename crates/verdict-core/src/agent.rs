//! Core Agent trait definition

use crate::{AgentRole, Message, Result, RunContext, ToolSpec};
use async_trait::async_trait;

/// Contract shared by the orchestrator and the specialists
///
/// Agents receive an immutable view of the conversation and return a new
/// message; only the coordination loop appends to the history.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Role this agent plays in the run
    fn role(&self) -> AgentRole;

    /// Conversational name of the agent
    fn name(&self) -> &str {
        self.role().display_name()
    }

    /// Tools this agent may call, in declaration order
    fn tools(&self) -> &[ToolSpec] {
        &[]
    }

    /// Produce the next message given the full history
    async fn respond(&self, ctx: &RunContext, history: &[Message]) -> Result<Message>;
}
