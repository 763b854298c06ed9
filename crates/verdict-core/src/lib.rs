//! Core abstractions for verdict
//!
//! This crate defines the conversation model shared by every agent taking part
//! in an analysis run: roles, messages, tool calls and results, the
//! append-only conversation state, the terminal verdict and the run error
//! taxonomy. It also defines the [`Agent`] trait that every role implements.

pub mod agent;
pub mod context;
pub mod conversation;
pub mod error;
pub mod message;
pub mod tool;
pub mod verdict;

pub use agent::Agent;
pub use context::RunContext;
pub use conversation::{ConversationError, ConversationState};
pub use error::{Error, Result, RunError, RunErrorKind};
pub use message::{
    AgentRole, Directive, Message, Role, ToolCall, ToolFailure, ToolFailureKind, ToolResult,
};
pub use tool::ToolSpec;
pub use verdict::{FINAL_VERDICT_MARKER, Verdict, VerdictCategory};
