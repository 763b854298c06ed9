//! HTTP transport for the Tool Gateway
//!
//! JSON-RPC 2.0 requests over HTTP POST. Each [`HttpGateway`] owns its own
//! reqwest client, so concurrent runs never share a connection pool.

use super::{GatewayFactory, GatewayToolDefinition, GatewayToolResult, ServerInfo, ToolGateway};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use std::error::Error as StdError;
use std::io::ErrorKind;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Tool Gateway client using HTTP transport
pub struct HttpGateway {
    rpc_url: String,
    health_url: String,
    timeout: Duration,
    http_client: reqwest::Client,

    /// Server info from initialization
    server_info: Mutex<Option<ServerInfo>>,

    closed: AtomicBool,
    request_id: AtomicU64,
}

impl HttpGateway {
    /// Create a client from configuration
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let headers = build_headers(&config.resolved_headers()?)?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            rpc_url: config.rpc_url(),
            health_url: config.health_url(),
            timeout: config.timeout(),
            http_client,
            server_info: Mutex::new(None),
            closed: AtomicBool::new(false),
            request_id: AtomicU64::new(0),
        })
    }

    /// Server info captured by [`ToolGateway::connect`]
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.lock().await.clone()
    }

    /// Probe the gateway's `/health` endpoint
    pub async fn health(&self) -> Result<bool> {
        let response = self
            .http_client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, self.timeout))?;
        Ok(response.status().is_success())
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::NotConnected);
        }
        Ok(())
    }

    /// Send a JSON-RPC request and return its `result`
    async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        self.ensure_open()?;

        let id = self.next_request_id();
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        debug!(url = %self.rpc_url, method, id, "Sending gateway request");

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::RequestFailed(format!(
                "HTTP {status} for {method}: {body}"
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(self.timeout)
            } else {
                GatewayError::MalformedResponse(format!("{method}: {e}"))
            }
        })?;

        parse_rpc_response(method, body)
    }
}

#[async_trait]
impl ToolGateway for HttpGateway {
    #[instrument(skip(self), fields(url = %self.rpc_url))]
    async fn connect(&self) -> Result<ServerInfo> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "clientInfo": {
                "name": "verdict",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result = self.send_request("initialize", params).await?;
        let info = parse_server_info(&result);

        info!(
            server = %info.name,
            version = %info.version,
            protocol = %info.protocol_version,
            "Connected to tool gateway"
        );

        *self.server_info.lock().await = Some(info.clone());
        Ok(info)
    }

    async fn list_tools(&self) -> Result<Vec<GatewayToolDefinition>> {
        let result = self.send_request("tools/list", json!({})).await?;
        let tools = result.get("tools").cloned().unwrap_or(Value::Array(Vec::new()));

        serde_json::from_value(tools)
            .map_err(|e| GatewayError::MalformedResponse(format!("tools/list: {e}")))
    }

    #[instrument(skip(self, arguments), fields(url = %self.rpc_url))]
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<GatewayToolResult> {
        let params = json!({
            "name": name,
            "arguments": arguments
        });

        let result = self.send_request("tools/call", params).await?;
        let tool_result: GatewayToolResult = serde_json::from_value(result)
            .map_err(|e| GatewayError::MalformedResponse(format!("tools/call {name}: {e}")))?;

        if tool_result.is_error {
            return Err(GatewayError::ToolFailed {
                name: name.to_string(),
                message: tool_result.joined_text(),
            });
        }

        Ok(tool_result)
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(url = %self.rpc_url, "Closed tool gateway session");
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.rpc_url
    }
}

/// Opens a fresh [`HttpGateway`] for every run
#[derive(Debug, Clone)]
pub struct HttpGatewayFactory {
    config: GatewayConfig,
    endpoint: String,
}

impl HttpGatewayFactory {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = config.rpc_url();
        Ok(Self { config, endpoint })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[async_trait]
impl GatewayFactory for HttpGatewayFactory {
    async fn open(&self) -> Result<Arc<dyn ToolGateway>> {
        Ok(Arc::new(HttpGateway::from_config(&self.config)?))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn build_headers(headers: &std::collections::HashMap<String, String>) -> Result<HeaderMap> {
    let mut header_map = HeaderMap::new();
    header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (key, value) in headers {
        let name = HeaderName::from_str(key)
            .map_err(|e| GatewayError::ConfigError(format!("Invalid header name '{key}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| GatewayError::ConfigError(format!("Invalid header value for '{key}': {e}")))?;
        header_map.insert(name, value);
    }

    Ok(header_map)
}

/// Split a JSON-RPC response into its result or error
fn parse_rpc_response(method: &str, body: Value) -> Result<Value> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32603);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(GatewayError::Rpc { code, message });
    }

    body.get("result").cloned().ok_or_else(|| {
        GatewayError::MalformedResponse(format!("{method}: response has neither result nor error"))
    })
}

fn parse_server_info(result: &Value) -> ServerInfo {
    let field = |value: &Value, default: &str| value.as_str().unwrap_or(default).to_string();
    ServerInfo {
        name: field(&result["serverInfo"]["name"], "unknown"),
        version: field(&result["serverInfo"]["version"], "unknown"),
        protocol_version: field(&result["protocolVersion"], PROTOCOL_VERSION),
    }
}

/// Map a reqwest failure onto the gateway taxonomy
///
/// Refused, reset and aborted connections are transient; everything else is
/// not.
fn classify_transport_error(err: &reqwest::Error, timeout: Duration) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(timeout)
    } else if err.is_connect() || is_connection_drop(err) {
        GatewayError::ConnectionFailed(err.to_string())
    } else {
        GatewayError::RequestFailed(err.to_string())
    }
}

/// Whether an io::Error somewhere in the source chain is a dropped connection
fn is_connection_drop(err: &(dyn StdError + 'static)) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        source = current.source();
    }
    false
}
