//! Tool bridge
//!
//! Turns the tool calls of an agent message into tool results by invoking the
//! gateway. Every call gets its own timeout and the gateway retry policy;
//! failures become error results in the conversation rather than aborting the
//! run. Only arguments that violate the tool's schema abort the run.

use crate::observer::RunObserver;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;
use verdict_core::{RunError, ToolCall, ToolResult, ToolSpec};
use verdict_gateway::schema::validate_arguments;
use verdict_gateway::{GatewayError, RetryPolicy, ToolGateway};

/// Per-call limits applied by the bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Upper bound for a single gateway call, retries excluded
    pub call_timeout: Duration,

    pub retry: RetryPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Invokes tools on the gateway session of one run
pub struct ToolBridge {
    gateway: Arc<dyn ToolGateway>,
    config: BridgeConfig,
}

impl ToolBridge {
    pub fn new(gateway: Arc<dyn ToolGateway>, config: BridgeConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Check a call's arguments against the declaration it targets
    pub fn validate(&self, call: &ToolCall, spec: &ToolSpec) -> Result<(), RunError> {
        validate_arguments(&call.name, &call.arguments, &spec.input_schema).map_err(|e| {
            RunError::protocol_violation(e.to_string()).with_tool(call.name.clone())
        })
    }

    /// Invoke a single call
    ///
    /// Gateway failures are folded into an error result.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let gateway = &self.gateway;
        let call_timeout = self.config.call_timeout;
        let name = call.name.as_str();

        let outcome = self
            .config
            .retry
            .execute(name, || {
                let arguments = call.arguments_value();
                async move {
                    match timeout(call_timeout, gateway.call_tool(name, arguments)).await {
                        Ok(result) => result,
                        Err(_) => Err(GatewayError::Timeout(call_timeout)),
                    }
                }
            })
            .await;

        match outcome {
            Ok(result) => ToolResult::success(call, result.payload()),
            Err(e) => {
                warn!(tool = name, tool_call_id = %call.id, error = %e, "Tool call failed");
                ToolResult::failure(call, e.to_tool_failure())
            }
        }
    }

    /// Validate and invoke every call of one message concurrently
    ///
    /// Results come back in call order. Nothing is dispatched if any call
    /// fails validation.
    pub async fn invoke_all(
        &self,
        run_id: Uuid,
        calls: &[ToolCall],
        specs: &[ToolSpec],
        observer: &dyn RunObserver,
    ) -> Result<Vec<ToolResult>, RunError> {
        for call in calls {
            let spec = ToolSpec::find(specs, &call.name).ok_or_else(|| {
                RunError::protocol_violation(format!("undeclared tool '{}'", call.name))
                    .with_tool(call.name.clone())
            })?;
            self.validate(call, spec)?;
        }

        info!(%run_id, tool_count = calls.len(), "Dispatching tool calls");

        let results = join_all(calls.iter().map(|call| async move {
            observer.on_tool_start(run_id, call).await;
            let started = Instant::now();
            let result = self.invoke(call).await;
            let elapsed = started.elapsed();
            debug!(
                %run_id,
                tool = %call.name,
                duration_ms = elapsed.as_millis() as u64,
                is_error = result.is_error(),
                "Tool call finished"
            );
            observer.on_tool_done(run_id, &result, elapsed).await;
            result
        }))
        .await;

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoOpObserver;
    use crate::testing::GatewayScript;
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::{Value, json};
    use tokio_test::assert_err;
    use verdict_core::{RunErrorKind, ToolFailureKind};
    use verdict_gateway::schema::{object, string};
    use verdict_gateway::{GatewayToolDefinition, GatewayToolResult, ServerInfo};

    const NEWS: &str = "news_sentiment_tool";
    const TECH: &str = "technical_analysis_tool";

    fn specs() -> Vec<ToolSpec> {
        let schema = object(json!({"ticker_symbol": string(None)}), vec!["ticker_symbol"]);
        vec![
            ToolSpec::new(NEWS, "news", schema.clone()),
            ToolSpec::new(TECH, "technicals", schema),
        ]
    }

    fn call(id: &str, tool: &str) -> ToolCall {
        ToolCall::new(id, tool).with_argument("ticker_symbol", "AAPL")
    }

    fn fast_config() -> BridgeConfig {
        BridgeConfig {
            call_timeout: Duration::from_millis(50),
            retry: RetryPolicy::fast(),
        }
    }

    #[tokio::test]
    async fn test_results_in_call_order() {
        let gateway = Arc::new(
            GatewayScript::new()
                .respond_after(NEWS, Duration::from_millis(20), "Article #1. Apple beats")
                .respond(TECH, r#"{"RSI": 74.8}"#)
                .build(),
        );
        let bridge = ToolBridge::new(gateway.clone(), fast_config());

        let calls = vec![call("a", NEWS), call("b", TECH)];
        let results = bridge
            .invoke_all(Uuid::new_v4(), &calls, &specs(), &NoOpObserver)
            .await
            .unwrap();

        assert_eq!(results[0].tool_call_id, "a");
        assert_eq!(results[0].content, json!("Article #1. Apple beats"));
        assert_eq!(results[1].tool_call_id, "b");
        assert_eq!(results[1].content["RSI"], 74.8);
        assert_eq!(gateway.calls()[0].arguments, json!({"ticker_symbol": "AAPL"}));
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_result() {
        let gateway = Arc::new(GatewayScript::new().hang(TECH).build());
        let bridge = ToolBridge::new(gateway.clone(), fast_config());

        let result = bridge.invoke(&call("t", TECH)).await;
        let failure = result.error.unwrap();
        assert_eq!(failure.kind, ToolFailureKind::Timeout);
        assert_eq!(gateway.call_count(TECH), 1);
    }

    #[tokio::test]
    async fn test_connection_reset_retried_once() {
        let gateway = Arc::new(
            GatewayScript::new()
                .respond(NEWS, "recovered")
                .fail_once(NEWS, GatewayError::ConnectionFailed("connection reset".into()))
                .build(),
        );
        let bridge = ToolBridge::new(gateway.clone(), fast_config());

        let result = bridge.invoke(&call("n", NEWS)).await;
        assert!(!result.is_error());
        assert_eq!(result.content_text(), "recovered");
        assert_eq!(gateway.call_count(NEWS), 2);
    }

    #[tokio::test]
    async fn test_tool_error_not_retried() {
        let gateway = Arc::new(
            GatewayScript::new()
                .fail(
                    NEWS,
                    GatewayError::Rpc {
                        code: -32602,
                        message: "unknown ticker".into(),
                    },
                )
                .build(),
        );
        let bridge = ToolBridge::new(gateway.clone(), fast_config());

        let result = bridge.invoke(&call("n", NEWS)).await;
        assert_eq!(result.error.as_ref().and_then(|e| e.code), Some(-32602));
        assert!(result.render().starts_with("Error calling news_sentiment_tool"));
        assert_eq!(gateway.call_count(NEWS), 1);
    }

    #[tokio::test]
    async fn test_schema_violation_aborts_without_dispatch() {
        let gateway = Arc::new(GatewayScript::new().respond(NEWS, "ok").build());
        let bridge = ToolBridge::new(gateway.clone(), fast_config());

        let calls = vec![call("ok", NEWS), ToolCall::new("bad", NEWS)];
        let result = bridge
            .invoke_all(Uuid::new_v4(), &calls, &specs(), &NoOpObserver)
            .await;

        let err = assert_err!(result);
        assert_eq!(err.kind, RunErrorKind::ProtocolViolation);
        assert_eq!(err.tool.as_deref(), Some(NEWS));
        assert!(gateway.calls().is_empty());
    }

    mock! {
        Gateway {}

        #[async_trait]
        impl ToolGateway for Gateway {
            async fn connect(&self) -> verdict_gateway::Result<ServerInfo>;
            async fn list_tools(&self) -> verdict_gateway::Result<Vec<GatewayToolDefinition>>;
            async fn call_tool(
                &self,
                name: &str,
                arguments: Value,
            ) -> verdict_gateway::Result<GatewayToolResult>;
            async fn disconnect(&self) -> verdict_gateway::Result<()>;
            fn endpoint(&self) -> &str;
        }
    }

    #[tokio::test]
    async fn test_call_forwards_name_and_arguments() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_call_tool()
            .withf(|name: &str, arguments: &Value| {
                name == TECH && arguments == &json!({"ticker_symbol": "AAPL"})
            })
            .times(1)
            .returning(|_, _| Ok(GatewayToolResult::text(r#"{"SMA50": 203.65}"#)));

        let bridge = ToolBridge::new(Arc::new(gateway), fast_config());
        let result = bridge.invoke(&call("t", TECH)).await;

        assert!(!result.is_error());
        assert_eq!(result.content["SMA50"], 203.65);
    }

    #[tokio::test]
    async fn test_persistent_connection_failure_gives_up_after_retry() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_call_tool()
            .times(2)
            .returning(|_, _| Err(GatewayError::ConnectionFailed("connection refused".into())));

        let bridge = ToolBridge::new(Arc::new(gateway), fast_config());
        let result = bridge.invoke(&call("n", NEWS)).await;

        let failure = result.error.unwrap();
        assert_eq!(failure.kind, ToolFailureKind::Unavailable);
    }

    #[tokio::test]
    async fn test_undeclared_tool_rejected() {
        let gateway = Arc::new(GatewayScript::new().build());
        let bridge = ToolBridge::new(gateway, fast_config());

        let calls = vec![call("x", "get_stock_quote")];
        let err = bridge
            .invoke_all(Uuid::new_v4(), &calls, &specs(), &NoOpObserver)
            .await
            .unwrap_err();
        assert!(err.detail.contains("get_stock_quote"));
    }
}
