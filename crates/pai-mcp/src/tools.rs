// crates/pai-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Router
// Description: Tool catalog and routing for the PAI-DLC MCP server.
// Purpose: Expose thin wrappers over the config store, admission, and the
//          remote job service.
// Dependencies: pai-mcp-core, pai-mcp-config, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! The tool router dispatches MCP tool calls by [`ToolName`]. Config tools
//! wrap [`ConfigStore`], job tools wrap [`JobOrchestrator`], and submission
//! goes through [`AdmissionController`].
//! Security posture: tool inputs are untrusted. Every structured output passes
//! through [`redact_value`], and `pai_config` drops credentials entirely.
//!
//! ## Invariants
//! - Jobs are stopped or waited on only after the full ownership check.
//! - Capacity rejections are normal results, never JSON-RPC errors.
//! - Committed config changes emit an audit event listing paths, not values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pai_mcp_config::ConfigDiff;
use pai_mcp_config::ConfigStore;
use pai_mcp_config::DEFAULT_PROFILE;
use pai_mcp_config::StoreError;
use pai_mcp_config::field_catalog;
use pai_mcp_config::settings_schema;
use pai_mcp_core::CallerIdentity;
use pai_mcp_core::JobDetail;
use pai_mcp_core::JobOrchestrator;
use pai_mcp_core::ListJobsFilter;
use pai_mcp_core::OrchestratorError;
use pai_mcp_core::OwnershipError;
use pai_mcp_core::PodLogOptions;
use pai_mcp_core::RUNNING_STATUS;
use pai_mcp_core::is_terminal_status;
use pai_mcp_core::local_now;
use pai_mcp_core::owned_prefix;
use pai_mcp_core::redact_value;
use pai_mcp_core::validate_job_ownership;
use pai_mcp_core::validate_job_user;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::time::Instant;

use crate::admission::AdmissionController;
use crate::admission::AdmissionError;
use crate::admission::AdmissionOutcome;
use crate::admission::SubmitRequest;
use crate::audit::AdmissionAuditEvent;
use crate::audit::ConfigChangeEvent;
use crate::audit::McpAuditSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default `pai_job_list` page size.
const DEFAULT_LIST_LIMIT: u32 = 20;
/// Maximum `pai_job_list` page size.
const MAX_LIST_LIMIT: u32 = 100;
/// Default `pai_job_logs` line count.
const DEFAULT_LOG_LINES: u32 = 200;
/// Maximum `pai_job_logs` line count.
const MAX_LOG_LINES: u32 = 5000;
/// Default `pai_job_wait` timeout in seconds.
const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 30;
/// Maximum `pai_job_wait` timeout in seconds.
const MAX_WAIT_TIMEOUT_SECS: u64 = 3600;
/// Default `pai_job_wait` poll interval in seconds.
const DEFAULT_WAIT_POLL_SECS: u64 = 10;

/// Usage guide returned by `pai_help`.
const HELP_TEXT: &str = "\
# PAI-DLC MCP server

## Workflow
1. Commit and push your code. Jobs check out the configured code source.
2. Inspect settings: pai_config, pai_config_schema, pai_config_list_profiles.
3. Pick resources: pai_config_apply_profile(name) copies a profile into \"default\",
   or pai_config_update(updates={\"profiles.default.jobSpecs[0].resourceConfig.GPU\": \"4\"}).
   Pass profile=\"<name>\" to pai_config_update to edit one profile with relative paths.
4. Submit: pai_job_submit(name, command, profile?, codeBranch?, codeCommit?).
   The display name becomes {projectPrefix}-{name}-{YYYYMMDDHHmmss}.
5. Monitor: pai_job_wait(jobId, target=\"Running\"), then pai_job_logs(jobId).
   Check the branch and commit in the first log lines.
6. Finish: pai_job_wait(jobId, target=\"Terminal\") or pai_job_stop(jobId).

## Limits
- limits.maxRunningJobs (default 1) counts every non-terminal job under the prefix.
- limits.maxGPU and limits.maxCPU cap the summed podCount x resourceConfig across
  active jobs plus the new submission.
- A refused submission reports the limit, current usage, and active jobs. Stop a job or
  wait for one to finish, then resubmit.

## Locked fields
projectPrefix, regionId, workspaceId, resourceId, credentials, caller, and
codeSource.codeSourceId change only by re-initializing the settings file.

## Waiting
pai_job_wait returns reached=false on timeout. Call it again to keep waiting.
";

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Canonical tool names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolName {
    /// Caller identity and target workspace.
    Whoami,
    /// Sanitized settings.
    Config,
    /// Field catalog and settings JSON schema.
    ConfigSchema,
    /// Path-addressed settings update.
    ConfigUpdate,
    /// Saved profiles.
    ConfigListProfiles,
    /// Copy a profile into `default`.
    ConfigApplyProfile,
    /// Create or replace a profile.
    ConfigCreateProfile,
    /// Delete a profile.
    ConfigDeleteProfile,
    /// Configured mounts.
    MountsList,
    /// Configured code source.
    CodesourceGet,
    /// Recent jobs under the prefix.
    JobList,
    /// One job.
    JobGet,
    /// Admission-gated submission.
    JobSubmit,
    /// Stop an owned job.
    JobStop,
    /// Pod logs.
    JobLogs,
    /// Poll until a status target.
    JobWait,
    /// Usage guide.
    Help,
}

impl ToolName {
    /// Returns the canonical string name for the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Whoami => "pai_whoami",
            Self::Config => "pai_config",
            Self::ConfigSchema => "pai_config_schema",
            Self::ConfigUpdate => "pai_config_update",
            Self::ConfigListProfiles => "pai_config_list_profiles",
            Self::ConfigApplyProfile => "pai_config_apply_profile",
            Self::ConfigCreateProfile => "pai_config_create_profile",
            Self::ConfigDeleteProfile => "pai_config_delete_profile",
            Self::MountsList => "pai_mounts_list",
            Self::CodesourceGet => "pai_codesource_get",
            Self::JobList => "pai_job_list",
            Self::JobGet => "pai_job_get",
            Self::JobSubmit => "pai_job_submit",
            Self::JobStop => "pai_job_stop",
            Self::JobLogs => "pai_job_logs",
            Self::JobWait => "pai_job_wait",
            Self::Help => "pai_help",
        }
    }

    /// Returns all tool names in catalog order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Whoami,
            Self::Config,
            Self::ConfigSchema,
            Self::ConfigUpdate,
            Self::ConfigListProfiles,
            Self::ConfigApplyProfile,
            Self::ConfigCreateProfile,
            Self::ConfigDeleteProfile,
            Self::MountsList,
            Self::CodesourceGet,
            Self::JobList,
            Self::JobGet,
            Self::JobSubmit,
            Self::JobStop,
            Self::JobLogs,
            Self::JobWait,
            Self::Help,
        ]
    }

    /// Parses a tool name from its string representation.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|tool| tool.as_str() == name)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Tool entry returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// JSON schema for the arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Schema for a tool that takes no arguments.
fn no_args() -> Value {
    json!({ "type": "object", "properties": {}, "additionalProperties": false })
}

/// Schema for a tool that takes only `jobId`.
fn job_id_only() -> Value {
    json!({
        "type": "object",
        "properties": { "jobId": { "type": "string", "minLength": 1 } },
        "required": ["jobId"],
        "additionalProperties": false
    })
}

/// Schema for a tool that takes only a profile `name`.
fn profile_name_only() -> Value {
    json!({
        "type": "object",
        "properties": { "name": { "type": "string", "minLength": 1 } },
        "required": ["name"],
        "additionalProperties": false
    })
}

/// Returns the definition for one tool.
fn tool_definition(tool: ToolName) -> ToolDefinition {
    let (description, input_schema) = match tool {
        ToolName::Whoami => ("Show the caller identity and target region/workspace.", no_args()),
        ToolName::Config => ("Show current settings with credentials removed.", no_args()),
        ToolName::ConfigSchema => (
            "List modifiable settings fields with descriptions, constraints, and current \
             values, plus the settings JSON schema.",
            no_args(),
        ),
        ToolName::ConfigUpdate => (
            "Update settings by path, e.g. {\"limits.maxGPU\": 8}. With profile, paths are \
             relative to profiles.<profile>. Locked fields are refused.",
            json!({
                "type": "object",
                "properties": {
                    "profile": { "type": "string", "minLength": 1 },
                    "updates": { "type": "object", "minProperties": 1 }
                },
                "required": ["updates"],
                "additionalProperties": false
            }),
        ),
        ToolName::ConfigListProfiles => ("List saved job profiles.", no_args()),
        ToolName::ConfigApplyProfile => (
            "Copy a profile's jobType and jobSpecs into the default profile.",
            profile_name_only(),
        ),
        ToolName::ConfigCreateProfile => (
            "Create or replace a profile from {jobType, jobSpecs}. With fromCurrent, start \
             from the default profile and apply overrides on top.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "pattern": "^[a-z0-9-]+$" },
                    "overrides": { "type": "object" },
                    "fromCurrent": { "type": "boolean" }
                },
                "required": ["name", "overrides"],
                "additionalProperties": false
            }),
        ),
        ToolName::ConfigDeleteProfile => {
            ("Delete a profile. The default profile cannot be deleted.", profile_name_only())
        }
        ToolName::MountsList => ("List configured data source mounts.", no_args()),
        ToolName::CodesourceGet => ("Show the configured code source.", no_args()),
        ToolName::JobList => (
            "List recent jobs under the project prefix, newest first.",
            json!({
                "type": "object",
                "properties": {
                    "limit": { "type": "integer", "minimum": 1, "maximum": MAX_LIST_LIMIT }
                },
                "additionalProperties": false
            }),
        ),
        ToolName::JobGet => ("Get details for one job.", job_id_only()),
        ToolName::JobSubmit => (
            "Submit a job using a profile. Refused when maxRunningJobs, maxGPU, or maxCPU \
             would be exceeded.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "command": { "type": "string", "minLength": 1 },
                    "profile": { "type": "string", "minLength": 1 },
                    "codeBranch": { "type": "string", "minLength": 1 },
                    "codeCommit": { "type": "string", "minLength": 1 }
                },
                "required": ["name", "command"],
                "additionalProperties": false
            }),
        ),
        ToolName::JobStop => ("Stop a job created under this project prefix.", job_id_only()),
        ToolName::JobLogs => (
            "Fetch log lines from a job pod; defaults to the first pod.",
            json!({
                "type": "object",
                "properties": {
                    "jobId": { "type": "string", "minLength": 1 },
                    "podId": { "type": "string", "minLength": 1 },
                    "maxLines": { "type": "integer", "minimum": 1, "maximum": MAX_LOG_LINES }
                },
                "required": ["jobId"],
                "additionalProperties": false
            }),
        ),
        ToolName::JobWait => (
            "Poll a job until it is Running or terminal. Returns reached=false on timeout, \
             not an error; call again to keep waiting.",
            json!({
                "type": "object",
                "properties": {
                    "jobId": { "type": "string", "minLength": 1 },
                    "target": { "type": "string", "enum": ["Running", "Terminal"] },
                    "timeoutSec": {
                        "type": "integer", "minimum": 1, "maximum": MAX_WAIT_TIMEOUT_SECS
                    },
                    "pollSec": { "type": "integer", "minimum": 1 }
                },
                "required": ["jobId"],
                "additionalProperties": false
            }),
        ),
        ToolName::Help => ("Show the usage guide.", no_args()),
    };
    ToolDefinition {
        name: tool.as_str(),
        description,
        input_schema,
    }
}

/// Returns the full tool catalog in canonical order.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::all().iter().copied().map(tool_definition).collect()
}

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// `pai_config_update` arguments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigUpdateRequest {
    /// Profile the paths are relative to.
    #[serde(default)]
    profile: Option<String>,
    /// Path to value map.
    updates: BTreeMap<String, Value>,
}

/// Arguments naming one profile.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ProfileNameRequest {
    /// Profile name.
    name: String,
}

/// `pai_config_create_profile` arguments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateProfileRequest {
    /// Profile name.
    name: String,
    /// Profile body or overrides.
    overrides: Value,
    /// Start from the default profile.
    #[serde(default)]
    from_current: bool,
}

/// `pai_job_list` arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JobListRequest {
    /// Page size.
    #[serde(default)]
    limit: Option<u32>,
}

/// Arguments naming one job.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JobIdRequest {
    /// Job id.
    job_id: String,
}

/// `pai_job_submit` arguments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JobSubmitRequest {
    /// Task name.
    name: String,
    /// Container command.
    command: String,
    /// Profile name.
    #[serde(default)]
    profile: Option<String>,
    /// Branch override.
    #[serde(default)]
    code_branch: Option<String>,
    /// Commit override.
    #[serde(default)]
    code_commit: Option<String>,
}

/// `pai_job_logs` arguments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JobLogsRequest {
    /// Job id.
    job_id: String,
    /// Pod id; defaults to the first pod.
    #[serde(default)]
    pod_id: Option<String>,
    /// Line count.
    #[serde(default)]
    max_lines: Option<u32>,
}

/// Status target for `pai_job_wait`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
enum WaitTarget {
    /// Pods are executing.
    #[default]
    Running,
    /// Succeeded, failed, or stopped.
    Terminal,
}

impl WaitTarget {
    /// Returns the target literal.
    const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Terminal => "Terminal",
        }
    }
}

/// `pai_job_wait` arguments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JobWaitRequest {
    /// Job id.
    job_id: String,
    /// Status target.
    #[serde(default)]
    target: WaitTarget,
    /// Polling budget in seconds.
    #[serde(default)]
    timeout_sec: Option<u64>,
    /// Poll interval in seconds.
    #[serde(default)]
    poll_sec: Option<u64>,
}

// ============================================================================
// SECTION: Outputs
// ============================================================================

/// Result of a successful tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Structured result, already redacted.
    Json(Value),
    /// Plain text result.
    Text(String),
    /// Normal refusal such as a capacity rejection.
    Rejected(String),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool routing errors, each mapped to a JSON-RPC code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Tool name not recognized.
    #[error("unknown tool")]
    UnknownTool,
    /// Arguments failed decoding or validation.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// Job belongs to another installation or user.
    #[error("{0}")]
    Ownership(String),
    /// Job, pod, or profile not found.
    #[error("{0}")]
    NotFound(String),
    /// Operation conflicts with current state.
    #[error("{0}")]
    Conflict(String),
    /// Mutation touched a locked field.
    #[error("{0}")]
    LockedField(String),
    /// Settings cannot produce a job.
    #[error("{0}")]
    ConfigurationIncomplete(String),
    /// Remote job service failure.
    #[error("{0}")]
    Orchestrator(String),
    /// Local failure such as settings I/O.
    #[error("internal error: {0}")]
    Internal(String),
    /// Result serialization failed.
    #[error("serialization failure")]
    Serialization,
}

impl ToolError {
    /// Returns the JSON-RPC error code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::UnknownTool => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Ownership(_) => -32003,
            Self::NotFound(_) => -32004,
            Self::Conflict(_) => -32009,
            Self::LockedField(_) => -32011,
            Self::ConfigurationIncomplete(_) => -32012,
            Self::Orchestrator(_) => -32030,
            Self::Internal(_) => -32050,
            Self::Serialization => -32060,
        }
    }
}

impl From<StoreError> for ToolError {
    fn from(error: StoreError) -> Self {
        let message = error.to_string();
        match error {
            StoreError::InvalidPath {
                ..
            }
            | StoreError::SchemaValidationFailure(_)
            | StoreError::InvalidProfileName {
                ..
            }
            | StoreError::TooManyUpdateKeys {
                ..
            }
            | StoreError::EmptyUpdate => Self::InvalidParams(message),
            StoreError::LockedFieldViolation {
                ..
            } => Self::LockedField(message),
            StoreError::ProfileNotFound(_) => Self::NotFound(message),
            StoreError::CannotDelete {
                ..
            } => Self::Conflict(message),
            StoreError::Io(_) => Self::Internal(message),
        }
    }
}

impl From<OrchestratorError> for ToolError {
    fn from(error: OrchestratorError) -> Self {
        match error {
            OrchestratorError::NotFound(job_id) => Self::NotFound(format!("Job '{job_id}' not found.")),
            other => Self::Orchestrator(other.to_string()),
        }
    }
}

impl From<OwnershipError> for ToolError {
    fn from(error: OwnershipError) -> Self {
        match error {
            OwnershipError::OwnershipMismatch(reason) => Self::Ownership(reason),
        }
    }
}

impl From<AdmissionError> for ToolError {
    fn from(error: AdmissionError) -> Self {
        let message = error.to_string();
        match error {
            AdmissionError::ConfigurationIncomplete(_) => Self::ConfigurationIncomplete(message),
            AdmissionError::ProfileNotFound(_) => Self::NotFound(message),
            AdmissionError::Orchestrator(inner) => inner.into(),
            AdmissionError::MissingJobId => Self::Orchestrator(message),
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Inputs required to build a [`ToolRouter`].
pub struct ToolRouterConfig {
    /// Settings store.
    pub store: Arc<ConfigStore>,
    /// Remote job service.
    pub orchestrator: Arc<dyn JobOrchestrator>,
    /// Identity resolved at startup.
    pub identity: CallerIdentity,
    /// Audit sink.
    pub audit: Arc<dyn McpAuditSink>,
}

/// Tool router for MCP requests.
#[derive(Clone)]
pub struct ToolRouter {
    /// Settings store.
    store: Arc<ConfigStore>,
    /// Remote job service.
    orchestrator: Arc<dyn JobOrchestrator>,
    /// Admission gates.
    admission: AdmissionController,
    /// Identity resolved at startup.
    identity: Arc<CallerIdentity>,
    /// Audit sink.
    audit: Arc<dyn McpAuditSink>,
}

impl ToolRouter {
    /// Creates a new tool router.
    #[must_use]
    pub fn new(config: ToolRouterConfig) -> Self {
        Self {
            admission: AdmissionController::new(Arc::clone(&config.orchestrator)),
            store: config.store,
            orchestrator: config.orchestrator,
            identity: Arc::new(config.identity),
            audit: config.audit,
        }
    }

    /// Lists the tools available to callers.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Handles a tool call by name with JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the tool is unknown, the arguments are
    /// invalid, or the underlying operation fails.
    pub async fn handle_tool_call(&self, name: &str, payload: Value) -> Result<ToolOutput, ToolError> {
        let tool = ToolName::parse(name).ok_or(ToolError::UnknownTool)?;
        let payload = if payload.is_null() { json!({}) } else { payload };
        match tool {
            ToolName::Whoami => self.handle_whoami(payload),
            ToolName::Config => self.handle_config(payload),
            ToolName::ConfigSchema => self.handle_config_schema(payload),
            ToolName::ConfigUpdate => self.handle_config_update(payload).await,
            ToolName::ConfigListProfiles => self.handle_list_profiles(payload),
            ToolName::ConfigApplyProfile => self.handle_apply_profile(payload).await,
            ToolName::ConfigCreateProfile => self.handle_create_profile(payload).await,
            ToolName::ConfigDeleteProfile => self.handle_delete_profile(payload).await,
            ToolName::MountsList => self.handle_mounts_list(payload),
            ToolName::CodesourceGet => self.handle_codesource_get(payload),
            ToolName::JobList => self.handle_job_list(payload).await,
            ToolName::JobGet => self.handle_job_get(payload).await,
            ToolName::JobSubmit => self.handle_job_submit(payload).await,
            ToolName::JobStop => self.handle_job_stop(payload).await,
            ToolName::JobLogs => self.handle_job_logs(payload).await,
            ToolName::JobWait => self.handle_job_wait(payload).await,
            ToolName::Help => {
                decode::<Empty>(payload)?;
                Ok(ToolOutput::Text(HELP_TEXT.to_string()))
            }
        }
    }

    /// Returns the caller's user id for ownership checks.
    fn caller_user_id(&self) -> Option<&str> {
        Some(self.identity.user_id.as_str()).filter(|user_id| !user_id.is_empty())
    }

    /// Handles `pai_whoami`.
    fn handle_whoami(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        decode::<Empty>(payload)?;
        let settings = self.store.snapshot();
        Ok(ToolOutput::Json(json!({
            "accountId": self.identity.account_id,
            "userId": self.identity.user_id,
            "identityType": self.identity.identity_type,
            "regionId": settings.region_id,
            "workspaceId": settings.workspace_id,
        })))
    }

    /// Handles `pai_config`.
    fn handle_config(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        decode::<Empty>(payload)?;
        let mut document =
            self.store.snapshot().to_value().map_err(|_| ToolError::Serialization)?;
        if let Some(map) = document.as_object_mut() {
            map.remove("credentials");
            map.remove("caller");
        }
        Ok(ToolOutput::Json(redact_value(&document)))
    }

    /// Handles `pai_config_schema`.
    fn handle_config_schema(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        decode::<Empty>(payload)?;
        let settings = self.store.snapshot();
        let fields = to_json(&field_catalog(&settings))?;
        Ok(ToolOutput::Json(json!({
            "fields": redact_value(&fields),
            "schema": settings_schema(),
        })))
    }

    /// Handles `pai_config_update`.
    async fn handle_config_update(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        let request = decode::<ConfigUpdateRequest>(payload)?;
        let updates = match request.profile {
            Some(profile) => {
                self.store.get_profile(&profile)?;
                request
                    .updates
                    .into_iter()
                    .map(|(path, value)| (format!("profiles.{profile}.{path}"), value))
                    .collect()
            }
            None => request.updates,
        };
        let diff = self.store.update_by_paths(updates).await?;
        let message = if diff.is_empty() {
            "No changes detected; values are already set.".to_string()
        } else {
            format!("Updated {} field(s).", diff.len())
        };
        self.diff_output(ToolName::ConfigUpdate, &message, &diff)
    }

    /// Handles `pai_config_list_profiles`.
    fn handle_list_profiles(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        decode::<Empty>(payload)?;
        let profiles: Vec<Value> = self
            .store
            .get_profiles()
            .into_iter()
            .map(|(name, profile)| {
                Ok(json!({
                    "name": name,
                    "overrides": to_json(&profile)?,
                }))
            })
            .collect::<Result<_, ToolError>>()?;
        Ok(ToolOutput::Json(redact_value(&Value::Array(profiles))))
    }

    /// Handles `pai_config_apply_profile`.
    async fn handle_apply_profile(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        let request = decode::<ProfileNameRequest>(payload)?;
        let diff = self.store.apply_profile(&request.name).await?;
        let message = format!("Profile \"{}\" applied.", request.name);
        self.diff_output(ToolName::ConfigApplyProfile, &message, &diff)
    }

    /// Handles `pai_config_create_profile`.
    async fn handle_create_profile(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        let request = decode::<CreateProfileRequest>(payload)?;
        let Value::Object(overrides) = request.overrides else {
            return Err(ToolError::InvalidParams("overrides must be an object".to_string()));
        };
        let body = if request.from_current {
            let mut base = match to_json(&self.store.get_profile(DEFAULT_PROFILE)?)? {
                Value::Object(base) => base,
                _ => return Err(ToolError::Serialization),
            };
            base.extend(overrides);
            base
        } else {
            overrides
        };
        let diff = self.store.set_profile(&request.name, Value::Object(body)).await?;
        let message = format!("Profile \"{}\" saved.", request.name);
        self.diff_output(ToolName::ConfigCreateProfile, &message, &diff)
    }

    /// Handles `pai_config_delete_profile`.
    async fn handle_delete_profile(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        let request = decode::<ProfileNameRequest>(payload)?;
        let diff = self.store.delete_profile(&request.name).await?;
        let message = format!("Profile \"{}\" deleted.", request.name);
        self.diff_output(ToolName::ConfigDeleteProfile, &message, &diff)
    }

    /// Handles `pai_mounts_list`.
    fn handle_mounts_list(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        decode::<Empty>(payload)?;
        let mounts = to_json(&self.store.snapshot().mounts)?;
        Ok(ToolOutput::Json(redact_value(&mounts)))
    }

    /// Handles `pai_codesource_get`.
    fn handle_codesource_get(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        decode::<Empty>(payload)?;
        match &self.store.snapshot().code_source {
            Some(code_source) => Ok(ToolOutput::Json(redact_value(&to_json(code_source)?))),
            None => Ok(ToolOutput::Text("No code source configured.".to_string())),
        }
    }

    /// Handles `pai_job_list`.
    async fn handle_job_list(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        let request = decode::<JobListRequest>(payload)?;
        let limit = normalize_limit(request.limit)?;
        let settings = self.store.snapshot();
        let filter =
            ListJobsFilter::for_prefix(&settings.workspace_id, &settings.project_prefix, limit);
        let prefix = owned_prefix(&settings.project_prefix);
        let jobs: Vec<Value> = self
            .orchestrator
            .list_jobs(&filter)
            .await?
            .into_iter()
            .filter(|job| job.display_name.starts_with(&prefix))
            .map(|job| {
                json!({
                    "jobId": job.job_id,
                    "displayName": job.display_name,
                    "status": job.status,
                    "gmtCreateTime": job.gmt_create_time,
                })
            })
            .collect();
        Ok(ToolOutput::Json(redact_value(&Value::Array(jobs))))
    }

    /// Handles `pai_job_get`.
    async fn handle_job_get(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        let request = decode::<JobIdRequest>(payload)?;
        let job = self.orchestrator.get_job(&request.job_id).await?;
        validate_job_user(&job.summary, self.caller_user_id())?;
        Ok(ToolOutput::Json(redact_value(&to_json(&job)?)))
    }

    /// Handles `pai_job_submit`.
    async fn handle_job_submit(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        let request = decode::<JobSubmitRequest>(payload)?;
        let submit = SubmitRequest {
            name: request.name,
            command: request.command,
            profile: request.profile.unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            code_branch: request.code_branch,
            code_commit: request.code_commit,
        };
        let settings = self.store.snapshot();
        let outcome = self.admission.submit(&settings, &submit, local_now()).await?;
        match outcome {
            AdmissionOutcome::Submitted {
                decision,
                job,
            } => {
                self.audit.record_admission(&AdmissionAuditEvent::new(&submit.profile, &decision));
                Ok(ToolOutput::Json(redact_value(&to_json(&job)?)))
            }
            AdmissionOutcome::Rejected(decision) => {
                self.audit.record_admission(&AdmissionAuditEvent::new(&submit.profile, &decision));
                let message =
                    decision.rejection.map(|rejection| rejection.to_string()).unwrap_or_default();
                Ok(ToolOutput::Rejected(message))
            }
        }
    }

    /// Handles `pai_job_stop`.
    async fn handle_job_stop(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        let request = decode::<JobIdRequest>(payload)?;
        let settings = self.store.snapshot();
        let job = self.orchestrator.get_job(&request.job_id).await?;
        validate_job_ownership(&job.summary, &settings.project_prefix, self.caller_user_id())?;
        self.orchestrator.stop_job(&request.job_id).await?;
        Ok(ToolOutput::Json(json!({
            "jobId": request.job_id,
            "result": "stopped",
        })))
    }

    /// Handles `pai_job_logs`.
    async fn handle_job_logs(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        let request = decode::<JobLogsRequest>(payload)?;
        let max_lines = request.max_lines.unwrap_or(DEFAULT_LOG_LINES);
        if max_lines == 0 || max_lines > MAX_LOG_LINES {
            return Err(ToolError::InvalidParams(format!(
                "maxLines must be between 1 and {MAX_LOG_LINES}"
            )));
        }
        let job = self.orchestrator.get_job(&request.job_id).await?;
        validate_job_user(&job.summary, self.caller_user_id())?;
        let pod = match &request.pod_id {
            Some(pod_id) => job.pods.iter().find(|pod| &pod.pod_id == pod_id),
            None => job.pods.first(),
        }
        .ok_or_else(|| ToolError::NotFound("No pod is available for this job.".to_string()))?;
        let options = PodLogOptions {
            max_lines,
            pod_uid: pod.pod_uid.clone(),
        };
        let lines = self.orchestrator.get_pod_logs(&request.job_id, &pod.pod_id, &options).await?;
        Ok(ToolOutput::Text(lines.join("\n")))
    }

    /// Handles `pai_job_wait`.
    async fn handle_job_wait(&self, payload: Value) -> Result<ToolOutput, ToolError> {
        let request = decode::<JobWaitRequest>(payload)?;
        let timeout_sec = request.timeout_sec.unwrap_or(DEFAULT_WAIT_TIMEOUT_SECS);
        let poll_sec = request.poll_sec.unwrap_or(DEFAULT_WAIT_POLL_SECS);
        if timeout_sec == 0 || timeout_sec > MAX_WAIT_TIMEOUT_SECS {
            return Err(ToolError::InvalidParams(format!(
                "timeoutSec must be between 1 and {MAX_WAIT_TIMEOUT_SECS}"
            )));
        }
        if poll_sec == 0 {
            return Err(ToolError::InvalidParams("pollSec must be at least 1".to_string()));
        }
        let settings = self.store.snapshot();
        let poll = Duration::from_secs(poll_sec);
        let deadline = Instant::now() + Duration::from_secs(timeout_sec);
        let target = request.target;
        let mut ownership_checked = false;
        loop {
            let job = self.orchestrator.get_job(&request.job_id).await?;
            if !ownership_checked {
                validate_job_ownership(
                    &job.summary,
                    &settings.project_prefix,
                    self.caller_user_id(),
                )?;
                ownership_checked = true;
            }
            let status = job.summary.status.as_str();
            let terminal = is_terminal_status(status);
            let reached = match target {
                WaitTarget::Running => status == RUNNING_STATUS,
                WaitTarget::Terminal => terminal,
            };
            if reached {
                return Ok(ToolOutput::Json(wait_snapshot(&job, true, None)));
            }
            if terminal {
                let message = format!("Job reached terminal status '{status}' before 'Running'.");
                return Ok(ToolOutput::Json(wait_snapshot(&job, false, Some(message))));
            }
            let now = Instant::now();
            if now >= deadline {
                let current = if status.is_empty() { "Unknown" } else { status };
                let message = format!(
                    "Not yet '{}' after {timeout_sec}s (current: '{current}'). Call pai_job_wait \
                     again to continue waiting.",
                    target.as_str()
                );
                return Ok(ToolOutput::Json(wait_snapshot(&job, false, Some(message))));
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }

    /// Builds a config-mutation result and records the change.
    fn diff_output(
        &self,
        tool: ToolName,
        message: &str,
        diff: &ConfigDiff,
    ) -> Result<ToolOutput, ToolError> {
        if !diff.is_empty() {
            self.audit.record_config_change(&ConfigChangeEvent::new(tool.as_str(), diff.paths()));
        }
        let changed = to_json(&diff.changed)?;
        Ok(ToolOutput::Json(json!({
            "message": message,
            "changed": redact_value(&changed),
        })))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Arguments for tools that take none.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Empty {}

/// Decodes tool arguments.
fn decode<T: for<'de> Deserialize<'de>>(payload: Value) -> Result<T, ToolError> {
    serde_json::from_value(payload).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

/// Serializes a tool result.
fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|_| ToolError::Serialization)
}

/// Normalizes list limits against defaults and bounds.
fn normalize_limit(limit: Option<u32>) -> Result<u32, ToolError> {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if limit == 0 || limit > MAX_LIST_LIMIT {
        return Err(ToolError::InvalidParams(format!(
            "limit must be between 1 and {MAX_LIST_LIMIT}"
        )));
    }
    Ok(limit)
}

/// Builds the `pai_job_wait` result.
fn wait_snapshot(job: &JobDetail, reached: bool, message: Option<String>) -> Value {
    let mut snapshot = json!({
        "jobId": job.summary.job_id,
        "status": job.summary.status,
        "displayName": job.summary.display_name,
        "duration": job.duration,
        "reached": reached,
    });
    if let (Some(message), Some(map)) = (message, snapshot.as_object_mut()) {
        map.insert("message".to_string(), Value::String(message));
    }
    redact_value(&snapshot)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use pai_mcp_config::StoreError;
    use pai_mcp_core::OrchestratorError;

    use super::ToolError;
    use super::ToolName;
    use super::normalize_limit;
    use super::tool_definitions;

    #[test]
    fn tool_names_round_trip_through_parse() {
        for tool in ToolName::all() {
            assert_eq!(ToolName::parse(tool.as_str()), Some(*tool));
        }
        assert_eq!(ToolName::parse("pai_nope"), None);
        assert_eq!(tool_definitions().len(), ToolName::all().len());
    }

    #[test]
    fn list_limit_bounds_are_enforced() {
        assert_eq!(normalize_limit(None).unwrap(), 20);
        assert_eq!(normalize_limit(Some(100)).unwrap(), 100);
        assert!(normalize_limit(Some(0)).is_err());
        assert!(normalize_limit(Some(101)).is_err());
    }

    #[test]
    fn store_errors_map_to_stable_codes() {
        let locked: ToolError = StoreError::LockedFieldViolation {
            field: "regionId".to_string(),
            path: "regionId".to_string(),
        }
        .into();
        assert_eq!(locked.code(), -32011);
        assert_eq!(ToolError::from(StoreError::EmptyUpdate).code(), -32602);
        assert_eq!(ToolError::from(StoreError::Io("disk full".to_string())).code(), -32050);
    }

    #[test]
    fn missing_job_reads_as_not_found() {
        let error = ToolError::from(OrchestratorError::NotFound("dlc-9".to_string()));
        assert_eq!(error.code(), -32004);
        assert_eq!(error.to_string(), "Job 'dlc-9' not found.");
    }
}
