// crates/pai-mcp/src/lib.rs
// ============================================================================
// Module: PAI MCP
// Description: MCP server, tool routing, and admission control for PAI-DLC.
// Purpose: Expose settings and training jobs to MCP clients over stdio.
// Dependencies: pai-mcp-core, pai-mcp-config, tokio
// ============================================================================

//! ## Overview
//! `pai-mcp` exposes the configuration store and the remote job service as
//! MCP tools. Every tool call flows through [`ToolRouter`]; job submissions
//! additionally pass the [`AdmissionController`] gates. The server speaks
//! JSON-RPC 2.0 over stdio.
//!
//! Security posture: tool arguments are untrusted, every result is redacted
//! before it leaves the process, and audit events never carry values.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod admission;
pub mod audit;
pub mod server;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use admission::AdmissionController;
pub use admission::AdmissionDecision;
pub use admission::AdmissionError;
pub use admission::AdmissionOutcome;
pub use admission::CapacityRejection;
pub use admission::SubmitRequest;
pub use admission::SubmittedJob;
pub use audit::AdmissionAuditEvent;
pub use audit::ConfigChangeEvent;
pub use audit::McpAuditSink;
pub use audit::McpFileAuditSink;
pub use audit::McpNoopAuditSink;
pub use audit::McpStderrAuditSink;
pub use audit::ToolCallEvent;
pub use audit::ToolOutcome;
pub use server::DEFAULT_MAX_BODY_BYTES;
pub use server::McpServer;
pub use server::McpServerError;
pub use tools::ToolDefinition;
pub use tools::ToolError;
pub use tools::ToolName;
pub use tools::ToolOutput;
pub use tools::ToolRouter;
pub use tools::ToolRouterConfig;
