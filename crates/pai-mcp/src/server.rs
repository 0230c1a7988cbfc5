// crates/pai-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: JSON-RPC 2.0 MCP server over stdio.
// Purpose: Expose PAI-DLC tools to MCP clients.
// Dependencies: serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! The MCP server reads JSON-RPC 2.0 messages from stdin and writes responses
//! to stdout, routing every `tools/call` through [`crate::tools::ToolRouter`].
//! Both Content-Length framing and newline-delimited JSON are accepted; each
//! response uses the framing of its request. Notifications get no response.
//! Security posture: inputs are untrusted; frames above the body limit are
//! discarded unread and answered with an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;

use crate::audit::McpAuditSink;
use crate::audit::ToolCallEvent;
use crate::audit::ToolOutcome;
use crate::tools::ToolDefinition;
use crate::tools::ToolError;
use crate::tools::ToolOutput;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum JSON-RPC frame size in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Protocol version announced when the client names none.
const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name announced during `initialize`.
const SERVER_NAME: &str = "pai-mcp";

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Audit sink for tool calls.
    audit: Arc<dyn McpAuditSink>,
    /// Maximum accepted frame size.
    max_body_bytes: usize,
}

impl McpServer {
    /// Builds a server over an assembled router.
    #[must_use]
    pub fn new(router: ToolRouter, audit: Arc<dyn McpAuditSink>, max_body_bytes: usize) -> Self {
        Self {
            router,
            audit,
            max_body_bytes,
        }
    }

    /// Serves requests over stdin/stdout until stdin closes.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Transport`] when stdio fails.
    pub async fn serve_stdio(&self) -> Result<(), McpServerError> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
    }

    /// Serves requests from `reader` to `writer` until the reader closes.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Transport`] on I/O failure or a malformed
    /// frame header.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), McpServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        while let Some(frame) = read_framed(&mut reader, self.max_body_bytes).await? {
            let response = match &frame.body {
                Some(bytes) => self.handle_message(bytes).await,
                None => Some(error_value(Value::Null, -32600, "request body too large")),
            };
            if let Some(response) = response {
                let payload = serde_json::to_vec(&response).map_err(|_| {
                    McpServerError::Transport("json-rpc serialization failed".to_string())
                })?;
                write_framed(&mut writer, frame.framing, &payload).await?;
            }
        }
        Ok(())
    }

    /// Handles one raw JSON-RPC message; returns `None` for notifications.
    pub async fn handle_message(&self, bytes: &[u8]) -> Option<Value> {
        let Ok(request) = serde_json::from_slice::<JsonRpcRequest>(bytes) else {
            return Some(error_value(Value::Null, -32600, "invalid json-rpc request"));
        };
        let id = request.id?;
        if request.jsonrpc != "2.0" {
            return Some(error_value(id, -32600, "invalid json-rpc version"));
        }
        let result = match request.method.as_str() {
            "initialize" => Ok(initialize_result(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => serde_json::to_value(ToolListResult {
                tools: self.router.list_tools(),
            })
            .map_err(|_| ToolError::Serialization),
            "tools/call" => {
                let params = request.params.unwrap_or(Value::Null);
                let Ok(call) = serde_json::from_value::<ToolCallParams>(params) else {
                    return Some(error_value(id, -32602, "invalid tool params"));
                };
                self.call_tool(&id, call).await
            }
            _ => return Some(error_value(id, -32601, "method not found")),
        };
        Some(match result {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err(error) => error_value(id, error.code(), &error.to_string()),
        })
    }

    /// Runs one tool call and records its audit event.
    async fn call_tool(&self, id: &Value, call: ToolCallParams) -> Result<Value, ToolError> {
        let request_id = match id {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let outcome = self.router.handle_tool_call(&call.name, call.arguments).await;
        let (audit_outcome, error_code) = match &outcome {
            Ok(ToolOutput::Rejected(_)) => (ToolOutcome::Rejected, None),
            Ok(_) => (ToolOutcome::Ok, None),
            Err(error) => (ToolOutcome::Error, Some(error.code())),
        };
        self.audit.record_tool_call(&ToolCallEvent::new(
            &call.name,
            Some(request_id),
            audit_outcome,
            error_code,
        ));
        let (text, is_error) = match outcome? {
            ToolOutput::Json(value) => {
                (serde_json::to_string_pretty(&value).map_err(|_| ToolError::Serialization)?, false)
            }
            ToolOutput::Text(text) => (text, false),
            ToolOutput::Rejected(text) => (text, true),
        };
        serde_json::to_value(ToolCallResult {
            content: vec![ToolContent::Text {
                text,
            }],
            is_error,
        })
        .map_err(|_| ToolError::Serialization)
    }
}

// ============================================================================
// SECTION: JSON-RPC Types
// ============================================================================

/// Incoming JSON-RPC message.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier; absent for notifications.
    #[serde(default)]
    id: Option<Value>,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    #[serde(default)]
    params: Option<Value>,
}

/// Tool call parameters for JSON-RPC requests.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

/// Tool call response payload.
#[derive(Debug, Serialize)]
struct ToolCallResult {
    /// Tool output content.
    content: Vec<ToolContent>,
    /// Set for normal refusals such as capacity rejections.
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    is_error: bool,
}

/// Tool output payloads for JSON-RPC responses.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolContent {
    /// Text tool output.
    Text {
        /// Text payload.
        text: String,
    },
}

/// Builds the `initialize` result.
fn initialize_result(params: Option<&Value>) -> Value {
    let protocol_version = params
        .and_then(|params| params.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);
    json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    })
}

/// Builds a JSON-RPC error response.
fn error_value(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

// ============================================================================
// SECTION: Framing Helpers
// ============================================================================

/// Wire framing of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// `Content-Length` header block followed by the body.
    ContentLength,
    /// One JSON document per line.
    Line,
}

/// One inbound message.
#[derive(Debug)]
struct Frame {
    /// Framing the reply must use.
    framing: Framing,
    /// Body bytes; `None` when the body exceeded the limit and was discarded.
    body: Option<Vec<u8>>,
}

/// Longest accepted `Content-Length` header line.
const MAX_HEADER_LINE_BYTES: usize = 1024;

/// Outcome of reading one bounded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineRead {
    /// Input ended before any byte.
    Eof,
    /// A line (or final unterminated chunk) is in the buffer.
    Line,
    /// The line exceeded the limit and was discarded.
    Oversized,
}

/// Maps a read failure to a transport error.
fn read_failed(_: std::io::Error) -> McpServerError {
    McpServerError::Transport("stdio read failed".to_string())
}

/// Reads one line of at most `limit` content bytes into `buf`.
///
/// Never buffers more than `limit + 1` bytes; the rest of an oversized line
/// is drained without being kept.
async fn read_bounded_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    limit: usize,
    buf: &mut Vec<u8>,
) -> Result<LineRead, McpServerError> {
    buf.clear();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = (&mut *reader).take(cap).read_until(b'\n', buf).await.map_err(read_failed)?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }
    let terminated = buf.last() == Some(&b'\n');
    if !terminated && buf.len() > limit {
        buf.clear();
        drain_line(reader).await?;
        return Ok(LineRead::Oversized);
    }
    Ok(LineRead::Line)
}

/// Discards input up to and including the next newline.
async fn drain_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<(), McpServerError> {
    loop {
        let (consumed, done) = {
            let available = reader.fill_buf().await.map_err(read_failed)?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|byte| *byte == b'\n') {
                Some(index) => (index + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(consumed);
        if done {
            return Ok(());
        }
    }
}

/// Reads one frame; returns `None` on a clean end of input.
async fn read_framed<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_body_bytes: usize,
) -> Result<Option<Frame>, McpServerError> {
    let mut line = Vec::new();
    loop {
        match read_bounded_line(reader, max_body_bytes, &mut line).await? {
            LineRead::Eof => return Ok(None),
            LineRead::Oversized => {
                return Ok(Some(Frame {
                    framing: Framing::Line,
                    body: None,
                }));
            }
            LineRead::Line => {}
        }
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with(b"{") || trimmed.starts_with(b"[") {
            let body = (trimmed.len() <= max_body_bytes).then(|| trimmed.to_vec());
            return Ok(Some(Frame {
                framing: Framing::Line,
                body,
            }));
        }
        break;
    }

    let mut content_length: Option<usize> = None;
    loop {
        if let Ok(header) = std::str::from_utf8(&line)
            && let Some((name, value)) = header.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| McpServerError::Transport("invalid content length".to_string()))?;
            content_length = Some(parsed);
        }
        match read_bounded_line(reader, MAX_HEADER_LINE_BYTES, &mut line).await? {
            LineRead::Eof => return Err(McpServerError::Transport("stdio closed".to_string())),
            LineRead::Oversized => {
                return Err(McpServerError::Transport("header line too long".to_string()));
            }
            LineRead::Line => {}
        }
        if line.trim_ascii().is_empty() {
            break;
        }
    }
    let len = content_length
        .ok_or_else(|| McpServerError::Transport("missing content length".to_string()))?;
    if len > max_body_bytes {
        let discard = u64::try_from(len)
            .map_err(|_| McpServerError::Transport("invalid content length".to_string()))?;
        tokio::io::copy(&mut (&mut *reader).take(discard), &mut tokio::io::sink())
            .await
            .map_err(read_failed)?;
        return Ok(Some(Frame {
            framing: Framing::ContentLength,
            body: None,
        }));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(read_failed)?;
    Ok(Some(Frame {
        framing: Framing::ContentLength,
        body: Some(buf),
    }))
}

/// Writes one payload using `framing`.
async fn write_framed<W: AsyncWrite + Unpin>(
    writer: &mut W,
    framing: Framing,
    payload: &[u8],
) -> Result<(), McpServerError> {
    let write_failed = |_| McpServerError::Transport("stdio write failed".to_string());
    match framing {
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", payload.len());
            writer.write_all(header.as_bytes()).await.map_err(write_failed)?;
            writer.write_all(payload).await.map_err(write_failed)?;
        }
        Framing::Line => {
            writer.write_all(payload).await.map_err(write_failed)?;
            writer.write_all(b"\n").await.map_err(write_failed)?;
        }
    }
    writer.flush().await.map_err(write_failed)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
