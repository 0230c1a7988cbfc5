// crates/pai-mcp-core/src/lib.rs
// ============================================================================
// Module: PAI MCP Core
// Description: Shared job model, collaborator traits, and safety helpers.
// Purpose: Provide the types every other PAI MCP crate builds on.
// Dependencies: async-trait, serde, thiserror, time
// ============================================================================

//! ## Overview
//! `pai-mcp-core` holds the job model exchanged with the remote orchestration
//! service, the traits the admission controller and tool router call through,
//! lenient GPU/CPU accounting, job naming and ownership rules, and credential
//! redaction.
//!
//! Security posture: remote job data is untrusted; redaction and ownership
//! checks are enforced at every caller-visible boundary.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod interfaces;
pub mod job;
pub mod naming;
pub mod redact;
pub mod resources;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use interfaces::CallerIdentity;
pub use interfaces::IdentityError;
pub use interfaces::IdentityResolver;
pub use interfaces::JobOrchestrator;
pub use interfaces::OrchestratorError;
pub use job::CodeSourceRequest;
pub use job::CreateJobRequest;
pub use job::DataSourceRequest;
pub use job::JobDetail;
pub use job::JobSpec;
pub use job::JobSummary;
pub use job::ListJobsFilter;
pub use job::PodInfo;
pub use job::PodLogOptions;
pub use job::RUNNING_STATUS;
pub use job::SortOrder;
pub use job::TERMINAL_STATUSES;
pub use job::is_active_status;
pub use job::is_terminal_status;
pub use naming::OwnershipError;
pub use naming::generate_display_name;
pub use naming::local_now;
pub use naming::owned_prefix;
pub use naming::validate_job_ownership;
pub use naming::validate_job_user;
pub use redact::REDACTED;
pub use redact::redact_value;
pub use resources::ResourceUsage;
pub use resources::summarize_specs;
pub use resources::total_usage;
