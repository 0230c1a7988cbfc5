// crates/pai-mcp-dlc/src/lib.rs
// ============================================================================
// Module: PAI MCP DLC Library
// Description: Signed clients for the DLC job service and STS.
// Purpose: Provide the production JobOrchestrator and IdentityResolver.
// Dependencies: pai-mcp-core, reqwest, sha2, rand, time, url
// ============================================================================

//! ## Overview
//! `pai-mcp-dlc` implements the collaborator traits from `pai-mcp-core`
//! against Alibaba Cloud: [`DlcClient`] for training jobs and [`StsClient`]
//! for caller identity. Both share one signed transport.
//!
//! Security posture: every request is signed with ACS3-HMAC-SHA256, redirects
//! are refused, and response bodies are size-capped.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod signing;
pub mod sts;
pub mod transport;
pub mod wire;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::DLC_API_VERSION;
pub use client::DlcClient;
pub use client::DlcClientConfig;
pub use client::dlc_endpoint;
pub use signing::AcsCredentials;
pub use sts::STS_API_VERSION;
pub use sts::StsClient;
pub use transport::AcsError;
pub use transport::DEFAULT_MAX_RESPONSE_BYTES;
pub use transport::DEFAULT_REQUEST_TIMEOUT;
