//! Analysis Protocol Client
//!
//! JSON-RPC 2.0 vocabulary on top of the stdio transport: the `initialize`
//! handshake and `tools/call` invocations. Request ids come from a monotonic
//! counter and every response is correlated against the id it was issued
//! with. Tool results are normalized into `ToolOutcome` here, at the
//! protocol boundary, so call sites never re-sniff response shapes.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::transport::{LauncherCommand, StdioTransport, TransportState};
use super::AnalysisError;

/// Protocol revision declared during the handshake
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client identity declared during the handshake
const CLIENT_NAME: &str = "leo-chat";

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// JSON-RPC 2.0 response envelope
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[allow(dead_code)]
    pub data: Option<Value>,
}

/// Normalized shape of a tool result.
///
/// The analysis server answers in several shapes: an object with a `results`
/// array (the `query` tool), an object with a `tables` array or a bare array
/// (`list_tables`), a bare string, or an arbitrary object (`db_info`). They
/// are collapsed into one tagged variant immediately after the call returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Ordered rows, each a column-name to value mapping
    Rows(Vec<Map<String, Value>>),
    /// A single structured value
    Scalar(Value),
    /// Plain text that did not parse as JSON
    RawText(String),
}

impl ToolOutcome {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => ToolOutcome::RawText(text),
            Value::Array(items) => ToolOutcome::Rows(coerce_rows(items)),
            Value::Object(map) => {
                if let Some(Value::Array(items)) = map.get("results") {
                    ToolOutcome::Rows(coerce_rows(items.clone()))
                } else if let Some(Value::Array(items)) = map.get("tables") {
                    ToolOutcome::Rows(coerce_rows(items.clone()))
                } else {
                    ToolOutcome::Scalar(Value::Object(map))
                }
            }
            other => ToolOutcome::Scalar(other),
        }
    }
}

/// Non-object row elements become single-column rows so downstream
/// formatting stays uniform.
fn coerce_rows(items: Vec<Value>) -> Vec<Map<String, Value>> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => map,
            Value::String(s) => {
                let mut row = Map::new();
                row.insert("name".to_string(), Value::String(s));
                row
            }
            other => {
                let mut row = Map::new();
                row.insert("value".to_string(), other);
                row
            }
        })
        .collect()
}

/// Client for the analysis server.
///
/// Holds the transport behind an async mutex: the wire protocol is
/// half-duplex, so concurrent callers are serialized here.
pub struct McpClient {
    transport: Mutex<StdioTransport>,
    request_id: AtomicU64,
}

impl McpClient {
    pub fn new() -> Self {
        Self {
            transport: Mutex::new(StdioTransport::new()),
            request_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Spawn the analysis server and perform the initialize handshake.
    ///
    /// `LauncherMissing` passes through unchanged so callers can report the
    /// missing prerequisite; every other startup problem (immediate exit,
    /// rejected or garbled handshake) collapses to `StartupFailed` and the
    /// process handle is discarded. No retry.
    pub async fn start(&self, launcher: &LauncherCommand) -> Result<(), AnalysisError> {
        let mut transport = self.transport.lock().await;
        transport.spawn(launcher).await?;

        match self.initialize(&mut transport).await {
            Ok(()) => {
                transport.mark_ready();
                info!("analysis server started and initialized");
                Ok(())
            }
            Err(e) => {
                warn!("analysis server handshake failed: {}", e);
                transport.fail().await;
                Err(AnalysisError::StartupFailed)
            }
        }
    }

    async fn initialize(&self, transport: &mut StdioTransport) -> Result<(), AnalysisError> {
        let id = self.next_id();
        let request = JsonRpcRequest::new(
            id,
            "initialize",
            Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "clientInfo": {
                    "name": CLIENT_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
        );

        let response = transport.send_and_receive(&request).await?;
        if response.id != Some(id) {
            return Err(AnalysisError::MalformedResponse);
        }
        if response.result.is_some() {
            Ok(())
        } else {
            Err(AnalysisError::HandshakeRejected)
        }
    }

    /// Invoke a tool and return its unwrapped result value.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, AnalysisError> {
        let id = self.next_id();
        let request = JsonRpcRequest::new(
            id,
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        );

        let response = {
            let mut transport = self.transport.lock().await;
            if !transport.is_ready() {
                return Err(AnalysisError::TransportClosed);
            }
            transport.send_and_receive(&request).await?
        };

        if response.id != Some(id) {
            warn!(
                "response id {:?} does not match request id {} for tool '{}'",
                response.id, id, name
            );
            return Err(AnalysisError::MalformedResponse);
        }

        match response.result {
            Some(result) => Ok(unwrap_tool_result(result)),
            None => {
                if let Some(error) = response.error {
                    debug!(
                        "tool '{}' failed: [{}] {}",
                        name, error.code, error.message
                    );
                }
                Err(AnalysisError::ToolCallFailed(name.to_string()))
            }
        }
    }

    /// Terminate the analysis server. Idempotent.
    pub async fn stop(&self) {
        self.transport.lock().await.stop().await;
    }

    pub async fn is_ready(&self) -> bool {
        self.transport.lock().await.is_ready()
    }

    pub async fn state(&self) -> TransportState {
        self.transport.lock().await.state()
    }
}

impl Default for McpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Unwrap the tool-call result payload.
///
/// A result carrying a `content` array of text blocks reduces to the first
/// block's text, parsed as JSON when possible. Anything else is returned
/// as-is.
fn unwrap_tool_result(result: Value) -> Value {
    if let Some(content) = result.get("content").and_then(|c| c.as_array()) {
        if let Some(text) = content
            .first()
            .and_then(|block| block.get("text"))
            .and_then(|t| t.as_str())
        {
            return serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
        }
    }
    result
}
