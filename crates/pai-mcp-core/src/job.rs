// crates/pai-mcp-core/src/job.rs
// ============================================================================
// Module: Job Model
// Description: Job records exchanged with the remote orchestration service.
// Purpose: Give the admission controller and tool surface one typed job view.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Jobs are owned by the remote orchestration service; this crate only models
//! the fields the admission controller and tool surface read. Job-spec records
//! stay opaque JSON objects because the service accepts far more keys than we
//! interpret (image, ecs spec, resource config, node affinity, ...).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Statuses after which a job never runs again.
pub const TERMINAL_STATUSES: [&str; 3] = ["Succeeded", "Failed", "Stopped"];

/// Status a job reports while its pods are executing.
pub const RUNNING_STATUS: &str = "Running";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Opaque job-spec record (`{type, image, podCount, resourceConfig, ...}`).
pub type JobSpec = Map<String, Value>;

/// Job as returned by a listing call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    /// Remote job identifier.
    pub job_id: String,
    /// Display name (`{prefix}-{name}-{timestamp}` for jobs we created).
    #[serde(default)]
    pub display_name: String,
    /// Raw status string; empty when the service has not assigned one yet.
    #[serde(default)]
    pub status: String,
    /// Framework type, e.g. `PyTorchJob`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    /// Job-spec records the job was created with.
    #[serde(default)]
    pub job_specs: Vec<JobSpec>,
    /// Owning user id when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Creation timestamp as reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gmt_create_time: Option<String>,
}

impl JobSummary {
    /// Returns true when the job still occupies a concurrency slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        is_active_status(&self.status)
    }
}

/// Pod belonging to a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInfo {
    /// Pod identifier used for log retrieval.
    pub pod_id: String,
    /// Pod UID, forwarded to log retrieval when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_uid: Option<String>,
    /// Pod status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Pod type (`Worker`, `Master`, ...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub pod_type: Option<String>,
}

/// Full job record returned by a get call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    /// Listing fields shared with [`JobSummary`].
    #[serde(flatten)]
    pub summary: JobSummary,
    /// Pods in creation order.
    #[serde(default)]
    pub pods: Vec<PodInfo>,
    /// Runtime in seconds when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// Resource quota the job runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Workspace the job belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    /// User command executed in the containers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_command: Option<String>,
    /// Code source block as reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_source: Option<Value>,
    /// Data source mounts as reported by the service.
    #[serde(default)]
    pub data_sources: Vec<Value>,
    /// Failure or status reason text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_message: Option<String>,
}

/// Code source reference attached to a new job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSourceRequest {
    /// Registered code source id.
    pub code_source_id: String,
    /// Branch to check out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Commit to check out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Container path the checkout is mounted at.
    pub mount_path: String,
}

/// Data source mount attached to a new job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceRequest {
    /// Storage URI (`oss://bucket/path/`).
    pub uri: String,
    /// Container mount path.
    pub mount_path: String,
    /// Access literal in the service's vocabulary (`RO`, `ReadWrite`).
    pub mount_access: String,
    /// Extra mount options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

/// Job creation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    /// Workspace the job is created in.
    pub workspace_id: String,
    /// Resource quota the job consumes.
    pub resource_id: String,
    /// Generated display name.
    pub display_name: String,
    /// Framework type.
    pub job_type: String,
    /// Job-spec records (never empty).
    pub job_specs: Vec<JobSpec>,
    /// Command executed in the containers.
    pub user_command: String,
    /// Optional code checkout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_source: Option<CodeSourceRequest>,
    /// Data source mounts.
    #[serde(default)]
    pub data_sources: Vec<DataSourceRequest>,
}

/// Sort order for job listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    Asc,
    /// Newest first.
    Desc,
}

impl SortOrder {
    /// Returns the wire literal for the sort order.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Listing filter for remote jobs.
///
/// # Invariants
/// - `page_size` and `page_number` are at least 1 when sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListJobsFilter {
    /// Workspace to list.
    pub workspace_id: String,
    /// Display-name substring filter applied by the service.
    pub display_name: Option<String>,
    /// Only return jobs created by the caller.
    pub show_own: bool,
    /// Page size.
    pub page_size: u32,
    /// 1-based page number.
    pub page_number: u32,
    /// Sort field (`GmtCreateTime`).
    pub sort_by: Option<String>,
    /// Sort order.
    pub order: Option<SortOrder>,
}

impl ListJobsFilter {
    /// Builds the filter used for prefix-scoped listings, newest first.
    #[must_use]
    pub fn for_prefix(workspace_id: &str, project_prefix: &str, page_size: u32) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            display_name: Some(project_prefix.to_string()),
            show_own: true,
            page_size,
            page_number: 1,
            sort_by: Some("GmtCreateTime".to_string()),
            order: Some(SortOrder::Desc),
        }
    }
}

/// Log retrieval options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodLogOptions {
    /// Maximum number of lines to return.
    pub max_lines: u32,
    /// Pod UID when known.
    pub pod_uid: Option<String>,
}

// ============================================================================
// SECTION: Status Helpers
// ============================================================================

/// Returns true when the status is terminal.
#[must_use]
pub fn is_terminal_status(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

/// Returns true when the status occupies a concurrency slot.
///
/// Any non-empty, non-terminal status counts, including `Queuing` and
/// `Creating`.
#[must_use]
pub fn is_active_status(status: &str) -> bool {
    !status.is_empty() && !is_terminal_status(status)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
