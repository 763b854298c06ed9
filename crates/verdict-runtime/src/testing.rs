//! Scripted Tool Gateway for tests
//!
//! [`GatewayScript`] describes how each tool behaves; [`ScriptedGateway`]
//! plays it back and records every call. [`ScriptedGatewayFactory`] opens a
//! fresh scripted session per run and keeps them for inspection.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use verdict_gateway::{
    GatewayError, GatewayFactory, GatewayToolDefinition, GatewayToolResult, Result, ServerInfo,
    ToolGateway,
};

const SCRIPTED_ENDPOINT: &str = "scripted://gateway";

#[derive(Debug, Clone)]
enum Behavior {
    Respond(String),
    RespondAfter(Duration, String),
    Fail(GatewayError),
    Hang,
}

/// How a scripted gateway answers
#[derive(Debug, Clone, Default)]
pub struct GatewayScript {
    behaviors: HashMap<String, Behavior>,
    unlisted: Vec<String>,
    one_shot: HashMap<String, Vec<GatewayError>>,
    connect_error: Option<GatewayError>,
    list_error: Option<GatewayError>,
}

impl GatewayScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `tool` with a text block
    pub fn respond(mut self, tool: &str, text: impl Into<String>) -> Self {
        self.behaviors.insert(tool.to_string(), Behavior::Respond(text.into()));
        self
    }

    /// Answer after sleeping for `delay`
    pub fn respond_after(mut self, tool: &str, delay: Duration, text: impl Into<String>) -> Self {
        self.behaviors
            .insert(tool.to_string(), Behavior::RespondAfter(delay, text.into()));
        self
    }

    /// Fail every call to `tool`
    pub fn fail(mut self, tool: &str, error: GatewayError) -> Self {
        self.behaviors.insert(tool.to_string(), Behavior::Fail(error));
        self
    }

    /// Never answer calls to `tool`
    pub fn hang(mut self, tool: &str) -> Self {
        self.behaviors.insert(tool.to_string(), Behavior::Hang);
        self
    }

    /// Fail the next call to `tool` once before its regular behavior applies
    pub fn fail_once(mut self, tool: &str, error: GatewayError) -> Self {
        self.one_shot.entry(tool.to_string()).or_default().push(error);
        self
    }

    /// Keep `tool` callable but leave it out of `tools/list`
    pub fn unlisted(mut self, tool: &str) -> Self {
        self.unlisted.push(tool.to_string());
        self
    }

    pub fn refuse_connect(mut self, error: GatewayError) -> Self {
        self.connect_error = Some(error);
        self
    }

    pub fn fail_listing(mut self, error: GatewayError) -> Self {
        self.list_error = Some(error);
        self
    }

    pub fn build(self) -> ScriptedGateway {
        ScriptedGateway {
            one_shot: Mutex::new(self.one_shot.clone()),
            script: self,
            calls: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
        }
    }
}

/// A call received by a scripted gateway
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub name: String,
    pub arguments: Value,
}

/// Gateway session that plays back a [`GatewayScript`]
#[derive(Debug)]
pub struct ScriptedGateway {
    script: GatewayScript,
    one_shot: Mutex<HashMap<String, Vec<GatewayError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    disconnected: AtomicBool,
}

impl ScriptedGateway {
    /// Calls received so far, in arrival order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self, tool: &str) -> usize {
        self.calls().iter().filter(|call| call.name == tool).count()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    fn take_one_shot(&self, tool: &str) -> Option<GatewayError> {
        let mut one_shot = self.one_shot.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = one_shot.get_mut(tool)?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }
}

#[async_trait]
impl ToolGateway for ScriptedGateway {
    async fn connect(&self) -> Result<ServerInfo> {
        if let Some(error) = &self.script.connect_error {
            return Err(error.clone());
        }
        Ok(ServerInfo {
            name: "scripted".to_string(),
            version: "0.0.0".to_string(),
            protocol_version: "2024-11-05".to_string(),
        })
    }

    async fn list_tools(&self) -> Result<Vec<GatewayToolDefinition>> {
        if let Some(error) = &self.script.list_error {
            return Err(error.clone());
        }

        let mut names: Vec<&String> = self
            .script
            .behaviors
            .keys()
            .filter(|name| !self.script.unlisted.contains(name))
            .collect();
        names.sort();

        Ok(names
            .into_iter()
            .map(|name| GatewayToolDefinition {
                name: name.clone(),
                description: None,
                input_schema: json!({
                    "type": "object",
                    "properties": {"ticker_symbol": {"type": "string"}},
                    "required": ["ticker_symbol"]
                }),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<GatewayToolResult> {
        if self.is_disconnected() {
            return Err(GatewayError::NotConnected);
        }

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                name: name.to_string(),
                arguments,
            });

        if let Some(error) = self.take_one_shot(name) {
            return Err(error);
        }

        match self.script.behaviors.get(name) {
            Some(Behavior::Respond(text)) => Ok(GatewayToolResult::text(text.clone())),
            Some(Behavior::RespondAfter(delay, text)) => {
                tokio::time::sleep(*delay).await;
                Ok(GatewayToolResult::text(text.clone()))
            }
            Some(Behavior::Fail(error)) => Err(error.clone()),
            Some(Behavior::Hang) => std::future::pending().await,
            None => Err(GatewayError::Rpc {
                code: -32601,
                message: format!("Unknown tool: {name}"),
            }),
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::Release);
        Ok(())
    }

    fn endpoint(&self) -> &str {
        SCRIPTED_ENDPOINT
    }
}

/// Opens one [`ScriptedGateway`] per run from a shared script
#[derive(Debug, Default)]
pub struct ScriptedGatewayFactory {
    script: GatewayScript,
    open_error: Option<GatewayError>,
    sessions: Mutex<Vec<Arc<ScriptedGateway>>>,
}

impl ScriptedGatewayFactory {
    pub fn new(script: GatewayScript) -> Self {
        Self {
            script,
            open_error: None,
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Fail every `open`, as if the gateway were down
    pub fn unreachable(error: GatewayError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::default()
        }
    }

    /// Sessions opened so far
    pub fn sessions(&self) -> Vec<Arc<ScriptedGateway>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether every opened session has been closed
    pub fn all_closed(&self) -> bool {
        self.sessions().iter().all(|session| session.is_disconnected())
    }
}

#[async_trait]
impl GatewayFactory for ScriptedGatewayFactory {
    async fn open(&self) -> Result<Arc<dyn ToolGateway>> {
        if let Some(error) = &self.open_error {
            return Err(error.clone());
        }
        let session = Arc::new(self.script.clone().build());
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session.clone());
        Ok(session)
    }

    fn endpoint(&self) -> &str {
        SCRIPTED_ENDPOINT
    }
}
