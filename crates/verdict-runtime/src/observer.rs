//! Run observation hooks
//!
//! Implement [`RunObserver`] to follow a run as it happens (turn starts,
//! appended messages, tool calls). Used by the CLI to stream progress.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;
use verdict_core::{AgentRole, Message, RunError, ToolCall, ToolResult, Verdict};

/// Event handler for coordination loop events
///
/// Every method has a no-op default, implement only what you need.
#[async_trait]
pub trait RunObserver: Send + Sync {
    /// Called before an agent is invoked
    async fn on_turn_start(&self, _run_id: Uuid, _turn: usize, _agent: AgentRole) {}

    /// Called after a message has been appended to the conversation
    async fn on_message(&self, _run_id: Uuid, _message: &Message) {}

    /// Called when a tool call is dispatched
    async fn on_tool_start(&self, _run_id: Uuid, _call: &ToolCall) {}

    /// Called when a tool call has produced a result
    async fn on_tool_done(&self, _run_id: Uuid, _result: &ToolResult, _elapsed: Duration) {}

    /// Called once when the run ends
    async fn on_finish(&self, _run_id: Uuid, _outcome: Result<&Verdict, &RunError>) {}
}

/// No-op observer for when events are not needed
pub struct NoOpObserver;

#[async_trait]
impl RunObserver for NoOpObserver {}
