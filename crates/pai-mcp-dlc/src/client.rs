// crates/pai-mcp-dlc/src/client.rs
// ============================================================================
// Module: DLC Job Client
// Description: JobOrchestrator implementation over the DLC REST API.
// Purpose: List, inspect, create, stop, and read logs of training jobs.
// Dependencies: async-trait, pai-mcp-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! [`DlcClient`] maps [`JobOrchestrator`] calls onto the DLC `2020-12-03`
//! REST routes under `https://pai-dlc.{region}.aliyuncs.com/api/v1/jobs`.
//! Request bodies are PascalCased on the way out; responses are camelCased
//! and decoded into the shared job model.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use pai_mcp_core::CreateJobRequest;
use pai_mcp_core::JobDetail;
use pai_mcp_core::JobOrchestrator;
use pai_mcp_core::JobSummary;
use pai_mcp_core::ListJobsFilter;
use pai_mcp_core::OrchestratorError;
use pai_mcp_core::PodLogOptions;
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::signing::AcsCredentials;
use crate::transport::AcsCall;
use crate::transport::AcsError;
use crate::transport::AcsTransport;
use crate::wire::to_camel_keys;
use crate::wire::to_pascal_keys;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// DLC API version.
pub const DLC_API_VERSION: &str = "2020-12-03";

/// Jobs collection path.
const JOBS_PATH: &str = "/api/v1/jobs";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// DLC client settings.
#[derive(Debug, Clone)]
pub struct DlcClientConfig {
    /// Region hosting the workspace.
    pub region_id: String,
    /// Signing key.
    pub credentials: AcsCredentials,
    /// Base URL replacing the regional endpoint.
    pub endpoint_override: Option<Url>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Response size limit in bytes.
    pub max_response_bytes: usize,
}

/// Returns the regional DLC endpoint.
///
/// # Errors
///
/// Returns [`AcsError::Config`] when the region produces an invalid URL.
pub fn dlc_endpoint(region_id: &str) -> Result<Url, AcsError> {
    Url::parse(&format!("https://pai-dlc.{region_id}.aliyuncs.com"))
        .map_err(|err| AcsError::Config(format!("invalid dlc endpoint: {err}")))
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// DLC REST client.
pub struct DlcClient {
    /// Signed executor.
    transport: AcsTransport,
    /// Service base URL.
    base: Url,
}

impl DlcClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AcsError::Config`] when the endpoint or HTTP client is
    /// invalid.
    pub fn new(config: DlcClientConfig) -> Result<Self, AcsError> {
        let base = match config.endpoint_override {
            Some(url) => url,
            None => dlc_endpoint(&config.region_id)?,
        };
        let transport =
            AcsTransport::new(config.credentials, config.timeout, config.max_response_bytes)?;
        Ok(Self {
            transport,
            base,
        })
    }

    /// Sends one DLC call.
    async fn call(
        &self,
        method: Method,
        path: String,
        query: BTreeMap<String, String>,
        body: Option<Value>,
        action: &'static str,
    ) -> Result<Value, AcsError> {
        self.transport
            .send(&self.base, AcsCall {
                method,
                path,
                query,
                body,
                action,
                version: DLC_API_VERSION,
            })
            .await
    }
}

#[async_trait]
impl JobOrchestrator for DlcClient {
    async fn list_jobs(&self, filter: &ListJobsFilter) -> Result<Vec<JobSummary>, OrchestratorError> {
        let response = self
            .call(Method::GET, JOBS_PATH.to_string(), list_jobs_query(filter), None, "ListJobs")
            .await
            .map_err(|err| orchestrator_error(err, None))?;
        parse_job_list(response)
    }

    async fn get_job(&self, job_id: &str) -> Result<JobDetail, OrchestratorError> {
        let response = self
            .call(Method::GET, job_path(job_id), BTreeMap::new(), None, "GetJob")
            .await
            .map_err(|err| orchestrator_error(err, Some(job_id)))?;
        parse_job_detail(response)
    }

    async fn create_job(&self, request: &CreateJobRequest) -> Result<String, OrchestratorError> {
        let body = create_job_body(request)?;
        let response = self
            .call(Method::POST, JOBS_PATH.to_string(), BTreeMap::new(), Some(body), "CreateJob")
            .await
            .map_err(|err| orchestrator_error(err, None))?;
        parse_created_job_id(&response)
    }

    async fn stop_job(&self, job_id: &str) -> Result<(), OrchestratorError> {
        self.call(Method::POST, format!("{}/stop", job_path(job_id)), BTreeMap::new(), None, "StopJob")
            .await
            .map_err(|err| orchestrator_error(err, Some(job_id)))?;
        Ok(())
    }

    async fn get_pod_logs(
        &self,
        job_id: &str,
        pod_id: &str,
        options: &PodLogOptions,
    ) -> Result<Vec<String>, OrchestratorError> {
        let path = format!("{}/pods/{pod_id}/logs", job_path(job_id));
        let response = self
            .call(Method::GET, path, pod_logs_query(options), None, "GetPodLogs")
            .await
            .map_err(|err| orchestrator_error(err, Some(job_id)))?;
        Ok(parse_pod_logs(&response))
    }
}

// ============================================================================
// SECTION: Request Builders
// ============================================================================

/// Returns the path of one job.
fn job_path(job_id: &str) -> String {
    format!("{JOBS_PATH}/{job_id}")
}

/// Builds the `ListJobs` query.
#[must_use]
pub fn list_jobs_query(filter: &ListJobsFilter) -> BTreeMap<String, String> {
    let mut query = BTreeMap::from([
        ("WorkspaceId".to_string(), filter.workspace_id.clone()),
        ("ShowOwn".to_string(), filter.show_own.to_string()),
        ("PageSize".to_string(), filter.page_size.max(1).to_string()),
        ("PageNumber".to_string(), filter.page_number.max(1).to_string()),
    ]);
    if let Some(name) = &filter.display_name {
        query.insert("DisplayName".to_string(), name.clone());
    }
    if let Some(sort_by) = &filter.sort_by {
        query.insert("SortBy".to_string(), sort_by.clone());
    }
    if let Some(order) = filter.order {
        query.insert("Order".to_string(), order.as_str().to_string());
    }
    query
}

/// Builds the `GetPodLogs` query.
#[must_use]
pub fn pod_logs_query(options: &PodLogOptions) -> BTreeMap<String, String> {
    let mut query = BTreeMap::from([("MaxLines".to_string(), options.max_lines.to_string())]);
    if let Some(uid) = &options.pod_uid {
        query.insert("PodUid".to_string(), uid.clone());
    }
    query
}

/// Builds the PascalCase `CreateJob` body.
///
/// # Errors
///
/// Returns [`OrchestratorError::InvalidResponse`] when the request cannot be
/// serialized.
pub fn create_job_body(request: &CreateJobRequest) -> Result<Value, OrchestratorError> {
    let local = serde_json::to_value(request)
        .map_err(|err| OrchestratorError::InvalidResponse(err.to_string()))?;
    Ok(to_pascal_keys(local))
}

// ============================================================================
// SECTION: Response Parsers
// ============================================================================

/// Decodes a `ListJobs` response.
///
/// # Errors
///
/// Returns [`OrchestratorError::InvalidResponse`] when jobs cannot be decoded.
pub fn parse_job_list(response: Value) -> Result<Vec<JobSummary>, OrchestratorError> {
    let jobs = match to_camel_keys(response) {
        Value::Object(mut map) => map.remove("jobs").unwrap_or(Value::Array(Vec::new())),
        _ => return Err(OrchestratorError::InvalidResponse("expected object".to_string())),
    };
    serde_json::from_value(jobs).map_err(|err| OrchestratorError::InvalidResponse(err.to_string()))
}

/// Decodes a `GetJob` response.
///
/// # Errors
///
/// Returns [`OrchestratorError::InvalidResponse`] when the job cannot be
/// decoded.
pub fn parse_job_detail(response: Value) -> Result<JobDetail, OrchestratorError> {
    serde_json::from_value(to_camel_keys(response))
        .map_err(|err| OrchestratorError::InvalidResponse(err.to_string()))
}

/// Extracts the job id from a `CreateJob` response.
///
/// # Errors
///
/// Returns [`OrchestratorError::InvalidResponse`] when no id is present.
pub fn parse_created_job_id(response: &Value) -> Result<String, OrchestratorError> {
    response
        .get("JobId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| OrchestratorError::InvalidResponse("CreateJob returned no JobId".to_string()))
}

/// Extracts log lines from a `GetPodLogs` response.
#[must_use]
pub fn parse_pod_logs(response: &Value) -> Vec<String> {
    response
        .get("Logs")
        .and_then(Value::as_array)
        .map(|lines| lines.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Maps a transport failure into the orchestration taxonomy.
fn orchestrator_error(err: AcsError, job_id: Option<&str>) -> OrchestratorError {
    match err {
        AcsError::Remote {
            status,
            code,
            message,
        } => match job_id {
            Some(id) if status == 404 || code.contains("NotFound") || code.contains("NotExist") => {
                OrchestratorError::NotFound(id.to_string())
            }
            _ => OrchestratorError::Remote {
                code,
                message,
            },
        },
        AcsError::InvalidResponse(message) => OrchestratorError::InvalidResponse(message),
        other => OrchestratorError::Transport(other.to_string()),
    }
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

    use pai_mcp_core::ListJobsFilter;
    use pai_mcp_core::OrchestratorError;
    use serde_json::json;

    use super::list_jobs_query;
    use super::orchestrator_error;
    use super::parse_created_job_id;
    use super::parse_job_list;
    use crate::transport::AcsError;

    #[test]
    fn list_query_carries_prefix_and_sort() {
        let query = list_jobs_query(&ListJobsFilter::for_prefix("ws-1", "alice", 20));
        assert_eq!(query.get("DisplayName").map(String::as_str), Some("alice"));
        assert_eq!(query.get("ShowOwn").map(String::as_str), Some("true"));
        assert_eq!(query.get("SortBy").map(String::as_str), Some("GmtCreateTime"));
        assert_eq!(query.get("Order").map(String::as_str), Some("desc"));
        assert_eq!(query.get("PageSize").map(String::as_str), Some("20"));
    }

    #[test]
    fn job_list_decodes_pascal_case() {
        let jobs = parse_job_list(json!({
            "Jobs": [{
                "JobId": "dlc-1",
                "DisplayName": "alice-train-20260101000000",
                "Status": "Running",
                "JobSpecs": [{ "PodCount": 1, "ResourceConfig": { "GPU": "4" } }],
                "UserId": "2002"
            }],
            "TotalCount": 1
        }))
        .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_specs[0]["resourceConfig"]["GPU"], json!("4"));
        assert_eq!(jobs[0].user_id.as_deref(), Some("2002"));
        assert!(parse_job_list(json!({ "TotalCount": 0 })).unwrap().is_empty());
    }

    #[test]
    fn created_job_id_is_required() {
        assert_eq!(parse_created_job_id(&json!({ "JobId": "dlc-9" })).unwrap(), "dlc-9");
        assert!(parse_created_job_id(&json!({ "RequestId": "r" })).is_err());
    }

    #[test]
    fn not_found_maps_only_for_single_job_calls() {
        let remote = AcsError::Remote {
            status: 404,
            code: "JobNotFound".to_string(),
            message: "missing".to_string(),
        };
        assert_eq!(
            orchestrator_error(remote.clone(), Some("dlc-1")),
            OrchestratorError::NotFound("dlc-1".to_string())
        );
        assert!(matches!(orchestrator_error(remote, None), OrchestratorError::Remote { .. }));
    }
}
