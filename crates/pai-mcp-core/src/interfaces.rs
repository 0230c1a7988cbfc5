// crates/pai-mcp-core/src/interfaces.rs
// ============================================================================
// Module: Collaborator Interfaces
// Description: Traits for the remote orchestration and identity services.
// Purpose: Keep admission and tool logic independent of the wire client.
// Dependencies: async-trait, serde, thiserror
// ============================================================================

//! ## Overview
//! The orchestration and identity services are remote collaborators. The
//! admission controller and tool router depend only on these traits, so the
//! HTTPS client and the in-memory test doubles are interchangeable.
//! Security posture: everything returned by these traits is remote input and
//! is treated as untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::job::CreateJobRequest;
use crate::job::JobDetail;
use crate::job::JobSummary;
use crate::job::ListJobsFilter;
use crate::job::PodLogOptions;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Caller identity resolved once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    /// Cloud account id.
    pub account_id: String,
    /// User id; compared against job owners.
    pub user_id: String,
    /// Identity type (`RAMUser`, `AssumedRoleUser`, ...).
    pub identity_type: String,
    /// Resource name of the principal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Remote job orchestration service.
#[async_trait]
pub trait JobOrchestrator: Send + Sync {
    /// Lists jobs matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the service call fails.
    async fn list_jobs(&self, filter: &ListJobsFilter)
    -> Result<Vec<JobSummary>, OrchestratorError>;

    /// Fetches a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NotFound`] when the job does not exist.
    async fn get_job(&self, job_id: &str) -> Result<JobDetail, OrchestratorError>;

    /// Creates a job and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the service rejects the job.
    async fn create_job(&self, request: &CreateJobRequest) -> Result<String, OrchestratorError>;

    /// Requests that a job stop.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the service call fails.
    async fn stop_job(&self, job_id: &str) -> Result<(), OrchestratorError>;

    /// Fetches log lines for one pod of a job.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the service call fails.
    async fn get_pod_logs(
        &self,
        job_id: &str,
        pod_id: &str,
        options: &PodLogOptions,
    ) -> Result<Vec<String>, OrchestratorError>;
}

/// Remote caller-identity service.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves the identity behind the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the identity cannot be resolved.
    async fn resolve_caller_identity(&self) -> Result<CallerIdentity, IdentityError>;
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Orchestration service failures.
///
/// # Invariants
/// - Variants are stable for error classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// Job does not exist.
    #[error("job '{0}' not found")]
    NotFound(String),
    /// Service returned an error body.
    #[error("orchestration service error {code}: {message}")]
    Remote {
        /// Service error code.
        code: String,
        /// Service error message.
        message: String,
    },
    /// Request never produced a response.
    #[error("orchestration transport error: {0}")]
    Transport(String),
    /// Response could not be interpreted.
    #[error("orchestration response invalid: {0}")]
    InvalidResponse(String),
}

/// Identity resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Service returned an error body.
    #[error("identity service error {code}: {message}")]
    Remote {
        /// Service error code.
        code: String,
        /// Service error message.
        message: String,
    },
    /// Request never produced a response.
    #[error("identity transport error: {0}")]
    Transport(String),
    /// Response lacked required identity fields.
    #[error("failed to resolve caller identity: {0}")]
    Incomplete(String),
}
