// crates/pai-mcp/src/audit.rs
// ============================================================================
// Module: MCP Audit Logging
// Description: Structured audit events for tool calls, config changes, and
//              admission decisions.
// Purpose: Emit value-free JSON-lines audit records without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are plain serializable structs written as one JSON object per
//! line. Sinks decide where the lines go: stderr (stdout carries the JSON-RPC
//! stream), an append-only file, or nowhere.
//! Security posture: events carry tool names, canonical paths, and counters
//! only. Setting values and credentials never reach a sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::admission::AdmissionDecision;
use crate::admission::CapacityRejection;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Tool call outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    /// Tool returned a result.
    Ok,
    /// Tool failed with a JSON-RPC error.
    Error,
    /// Tool returned a normal rejection (capacity gate).
    Rejected,
}

/// One `tools/call` request.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Tool name as requested.
    pub tool: String,
    /// JSON-RPC request id when provided.
    pub request_id: Option<String>,
    /// Call outcome.
    pub outcome: ToolOutcome,
    /// JSON-RPC error code when the call failed.
    pub error_code: Option<i64>,
}

/// One committed configuration change.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigChangeEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Tool that caused the change.
    pub tool: &'static str,
    /// Sorted canonical paths that changed.
    pub paths: Vec<String>,
}

/// One admission decision.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Profile the submission resolved.
    pub profile: String,
    /// `approved` or `rejected`.
    pub decision: &'static str,
    /// Active jobs counted against the concurrency gate.
    pub active_jobs: usize,
    /// GPUs requested by the submission.
    pub requested_gpu: u64,
    /// CPU cores requested by the submission.
    pub requested_cpu: u64,
    /// GPUs in use after admitting the submission.
    pub projected_gpu: u64,
    /// CPU cores in use after admitting the submission.
    pub projected_cpu: u64,
    /// Gate that rejected the submission.
    pub rejection: Option<&'static str>,
}

impl ToolCallEvent {
    /// Creates a tool call event stamped with the current time.
    #[must_use]
    pub fn new(
        tool: &str,
        request_id: Option<String>,
        outcome: ToolOutcome,
        error_code: Option<i64>,
    ) -> Self {
        Self {
            event: "tool_call",
            timestamp_ms: now_ms(),
            tool: tool.to_string(),
            request_id,
            outcome,
            error_code,
        }
    }
}

impl ConfigChangeEvent {
    /// Creates a config change event stamped with the current time.
    #[must_use]
    pub fn new(tool: &'static str, paths: Vec<String>) -> Self {
        Self {
            event: "config_change",
            timestamp_ms: now_ms(),
            tool,
            paths,
        }
    }
}

impl AdmissionAuditEvent {
    /// Summarizes an admission decision stamped with the current time.
    #[must_use]
    pub fn new(profile: &str, decision: &AdmissionDecision) -> Self {
        Self {
            event: "job_admission",
            timestamp_ms: now_ms(),
            profile: profile.to_string(),
            decision: if decision.rejection.is_some() { "rejected" } else { "approved" },
            active_jobs: decision.active_jobs.len(),
            requested_gpu: decision.requested.gpu,
            requested_cpu: decision.requested.cpu,
            projected_gpu: decision.projected.gpu,
            projected_cpu: decision.projected.cpu,
            rejection: decision.rejection.as_ref().map(CapacityRejection::kind),
        }
    }
}

/// Returns milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for MCP events.
pub trait McpAuditSink: Send + Sync {
    /// Record a tool call event.
    fn record_tool_call(&self, event: &ToolCallEvent);

    /// Record a committed configuration change.
    fn record_config_change(&self, _event: &ConfigChangeEvent) {}

    /// Record an admission decision.
    fn record_admission(&self, _event: &AdmissionAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct McpStderrAuditSink;

impl McpAuditSink for McpStderrAuditSink {
    fn record_tool_call(&self, event: &ToolCallEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_config_change(&self, event: &ConfigChangeEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_admission(&self, event: &AdmissionAuditEvent) {
        write_line(&mut io::stderr(), event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct McpFileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl McpFileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one event under the file lock.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(mut file) = self.file.lock() {
            write_line(&mut *file, event);
        }
    }
}

impl McpAuditSink for McpFileAuditSink {
    fn record_tool_call(&self, event: &ToolCallEvent) {
        self.append(event);
    }

    fn record_config_change(&self, event: &ConfigChangeEvent) {
        self.append(event);
    }

    fn record_admission(&self, event: &AdmissionAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct McpNoopAuditSink;

impl McpAuditSink for McpNoopAuditSink {
    fn record_tool_call(&self, _event: &ToolCallEvent) {}
}

/// Serializes `event` as one line; audit failures never fail a request.
fn write_line<T: Serialize>(writer: &mut impl Write, event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
        let _ = writer.flush();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
