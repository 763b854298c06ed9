//! Tool Gateway client for verdict
//!
//! The Tool Gateway is a long-lived service exposing named, schema-typed
//! tools. This crate talks to it over JSON-RPC 2.0 (`initialize`,
//! `tools/list`, `tools/call`) on HTTP POST, and provides:
//!
//! - the [`ToolGateway`] seam and a [`GatewayFactory`] that opens one session per run
//! - [`HttpGateway`], the reqwest-based client
//! - [`RetryPolicy`] for transient connection failures
//! - argument validation against a tool's declared schema
//! - [`GatewayConfig`] with `${VAR}` resolution for header values

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod schema;

pub use client::http::{HttpGateway, HttpGatewayFactory};
pub use client::{
    GatewayContent, GatewayFactory, GatewayToolDefinition, GatewayToolResult, ServerInfo,
    ToolGateway,
};
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use retry::RetryPolicy;
