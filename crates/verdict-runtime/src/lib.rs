//! Coordination runtime for verdict
//!
//! This crate provides the machinery that turns a team of agents into a
//! verdict: the [`Coordinator`] loop that schedules turns and enforces the
//! conversation protocol, the [`ToolBridge`] that executes tool calls on the
//! gateway, the LLM-backed [`LlmAgent`], and [`RunObserver`] hooks.

pub mod agents;
pub mod bridge;
pub mod coordinator;
pub mod observer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agents::{LlmAgent, LlmAgentConfig};
pub use bridge::{BridgeConfig, ToolBridge};
pub use coordinator::{
    AgentRoster, AnalysisOutcome, Coordinator, CoordinatorBuilder, LoopConfig, task_description,
};
pub use observer::{NoOpObserver, RunObserver};
pub use tokio_util::sync::CancellationToken;
