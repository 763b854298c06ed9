//! Agent implementations backed by a generation service
//!
//! - LlmAgent: any role, driven by an LLMProvider with function calling

pub mod llm;

pub use llm::{CONCLUDE_TOOL, DELEGATE_TOOL, LlmAgent, LlmAgentConfig};
