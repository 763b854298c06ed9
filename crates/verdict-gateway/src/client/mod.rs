//! Tool Gateway client abstractions

pub mod http;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Server identity returned by the `initialize` handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

/// Tool as advertised by `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayToolDefinition {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Content block of a `tools/call` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GatewayContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
}

/// Result payload of `tools/call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayToolResult {
    #[serde(default)]
    pub content: Vec<GatewayContent>,

    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl GatewayToolResult {
    /// Text result with a single block
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![GatewayContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Concatenated text blocks
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                GatewayContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Payload for the conversation
    ///
    /// Text that is itself a JSON object or array is returned structured;
    /// anything else stays text.
    pub fn payload(&self) -> Value {
        let text = self.joined_text();
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
            _ => Value::String(text),
        }
    }
}

/// A session with the Tool Gateway
///
/// One instance belongs to exactly one analysis run.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Perform the `initialize` handshake
    async fn connect(&self) -> Result<ServerInfo>;

    /// Tools registered at the gateway
    async fn list_tools(&self) -> Result<Vec<GatewayToolDefinition>>;

    /// Invoke a tool with JSON arguments
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<GatewayToolResult>;

    /// Release the session; later calls fail with `NotConnected`
    async fn disconnect(&self) -> Result<()>;

    /// Endpoint this session talks to
    fn endpoint(&self) -> &str;
}

/// Opens gateway sessions, one per analysis run
#[async_trait]
pub trait GatewayFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn ToolGateway>>;

    fn endpoint(&self) -> &str;
}
