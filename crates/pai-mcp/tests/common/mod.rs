// crates/pai-mcp/tests/common/mod.rs
// =============================================================================
// Module: MCP Test Helpers
// Description: Scripted job service, recording audit sink, settings fixtures.
// Purpose: Drive admission, tools, and the server without a remote service.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only fixtures."
)]

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use pai_mcp::AdmissionAuditEvent;
use pai_mcp::ConfigChangeEvent;
use pai_mcp::McpAuditSink;
use pai_mcp::ToolCallEvent;
use pai_mcp::ToolRouter;
use pai_mcp::ToolRouterConfig;
use pai_mcp_config::ConfigStore;
use pai_mcp_config::Settings;
use pai_mcp_config::write_settings;
use pai_mcp_core::CallerIdentity;
use pai_mcp_core::CreateJobRequest;
use pai_mcp_core::JobDetail;
use pai_mcp_core::JobOrchestrator;
use pai_mcp_core::JobSummary;
use pai_mcp_core::ListJobsFilter;
use pai_mcp_core::OrchestratorError;
use pai_mcp_core::PodInfo;
use pai_mcp_core::PodLogOptions;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// -----------------------------------------------------------------------------
// Job service
// -----------------------------------------------------------------------------

/// In-memory job service. `get_job` replays `statuses` front to back and
/// keeps returning the last one.
#[derive(Default)]
pub struct MockOrchestrator {
    pub jobs: Mutex<Vec<JobSummary>>,
    pub details: Mutex<BTreeMap<String, JobDetail>>,
    pub statuses: Mutex<VecDeque<String>>,
    pub created: Mutex<Vec<CreateJobRequest>>,
    pub stopped: Mutex<Vec<String>>,
    pub log_requests: Mutex<Vec<(String, String, PodLogOptions)>>,
    pub get_calls: Mutex<usize>,
}

impl MockOrchestrator {
    pub fn with_jobs(jobs: Vec<JobSummary>) -> Self {
        let orchestrator = Self::default();
        *orchestrator.jobs.lock().unwrap() = jobs;
        orchestrator
    }

    pub fn add_detail(&self, detail: JobDetail) {
        self.details.lock().unwrap().insert(detail.summary.job_id.clone(), detail);
    }

    pub fn script_statuses(&self, statuses: &[&str]) {
        *self.statuses.lock().unwrap() = statuses.iter().map(|status| (*status).to_string()).collect();
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn stopped_ids(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn get_call_count(&self) -> usize {
        *self.get_calls.lock().unwrap()
    }
}

#[async_trait]
impl JobOrchestrator for MockOrchestrator {
    async fn list_jobs(&self, _filter: &ListJobsFilter) -> Result<Vec<JobSummary>, OrchestratorError> {
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn get_job(&self, job_id: &str) -> Result<JobDetail, OrchestratorError> {
        *self.get_calls.lock().unwrap() += 1;
        let mut detail = self
            .details
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::NotFound(job_id.to_string()))?;
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 { statuses.pop_front() } else { statuses.front().cloned() };
        if let Some(status) = status {
            detail.summary.status = status;
        }
        Ok(detail)
    }

    async fn create_job(&self, request: &CreateJobRequest) -> Result<String, OrchestratorError> {
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let job_id = format!("dlc-{}", created.len());
        self.jobs.lock().unwrap().push(JobSummary {
            job_id: job_id.clone(),
            display_name: request.display_name.clone(),
            status: "Queuing".to_string(),
            job_type: Some(request.job_type.clone()),
            job_specs: request.job_specs.clone(),
            user_id: Some(USER_ID.to_string()),
            gmt_create_time: None,
        });
        Ok(job_id)
    }

    async fn stop_job(&self, job_id: &str) -> Result<(), OrchestratorError> {
        self.stopped.lock().unwrap().push(job_id.to_string());
        Ok(())
    }

    async fn get_pod_logs(
        &self,
        job_id: &str,
        pod_id: &str,
        options: &PodLogOptions,
    ) -> Result<Vec<String>, OrchestratorError> {
        self.log_requests.lock().unwrap().push((
            job_id.to_string(),
            pod_id.to_string(),
            options.clone(),
        ));
        Ok(vec!["epoch 1".to_string(), "epoch 2".to_string()])
    }
}

/// Caller user id used across fixtures.
pub const USER_ID: &str = "2002";

/// Builds a listed job with one single-pod spec.
pub fn job(job_id: &str, display_name: &str, status: &str, gpu: &str, cpu: &str) -> JobSummary {
    let spec = json!({
        "type": "Worker",
        "podCount": 1,
        "resourceConfig": { "GPU": gpu, "CPU": cpu }
    });
    JobSummary {
        job_id: job_id.to_string(),
        display_name: display_name.to_string(),
        status: status.to_string(),
        job_type: Some("PyTorchJob".to_string()),
        job_specs: vec![spec.as_object().cloned().unwrap()],
        user_id: Some(USER_ID.to_string()),
        gmt_create_time: Some("2026-03-04T05:06:07Z".to_string()),
    }
}

/// Wraps a summary into a detail record with the given pod ids.
pub fn detail(summary: JobSummary, pods: &[&str]) -> JobDetail {
    JobDetail {
        summary,
        pods: pods
            .iter()
            .map(|pod_id| PodInfo {
                pod_id: (*pod_id).to_string(),
                pod_uid: Some(format!("uid-{pod_id}")),
                status: Some("Running".to_string()),
                pod_type: Some("Worker".to_string()),
            })
            .collect(),
        duration: Some(42),
        ..JobDetail::default()
    }
}

// -----------------------------------------------------------------------------
// Audit
// -----------------------------------------------------------------------------

/// Audit sink that keeps every event as JSON.
#[derive(Default)]
pub struct RecordingAuditSink {
    pub events: Mutex<Vec<Value>>,
}

impl RecordingAuditSink {
    pub fn events_named(&self, name: &str) -> Vec<Value> {
        self.events.lock().unwrap().iter().filter(|event| event["event"] == name).cloned().collect()
    }
}

impl McpAuditSink for RecordingAuditSink {
    fn record_tool_call(&self, event: &ToolCallEvent) {
        self.events.lock().unwrap().push(serde_json::to_value(event).unwrap());
    }

    fn record_config_change(&self, event: &ConfigChangeEvent) {
        self.events.lock().unwrap().push(serde_json::to_value(event).unwrap());
    }

    fn record_admission(&self, event: &AdmissionAuditEvent) {
        self.events.lock().unwrap().push(serde_json::to_value(event).unwrap());
    }
}

// -----------------------------------------------------------------------------
// Settings
// -----------------------------------------------------------------------------

/// Returns a spec with one pod of the given GPU/CPU.
fn spec(gpu: &str, cpu: &str) -> Value {
    json!({
        "type": "Worker",
        "image": "registry/org/train:1",
        "podCount": 1,
        "resourceConfig": { "GPU": gpu, "CPU": cpu, "memory": "32Gi" }
    })
}

/// Returns a valid settings document with `limits` applied.
pub fn settings_value(limits: Value) -> Value {
    let mut document = json!({
        "version": "0.5.0",
        "projectPrefix": "alice",
        "regionId": "cn-hangzhou",
        "workspaceId": "ws-1",
        "resourceId": "quota-1",
        "credentials": {
            "accessKeyId": "LTAI1234567890abcd",
            "accessKeySecret": "secret-value-123"
        },
        "caller": { "accountId": "1001", "userId": USER_ID, "identityType": "RAMUser" },
        "codeSource": {
            "codeSourceId": "code-1",
            "mountPath": "/root/code",
            "defaultBranch": "main"
        },
        "mounts": [
            {
                "name": "data",
                "uri": "oss://bucket/data/",
                "mountPath": "/mnt/data",
                "mountAccess": "ReadOnly"
            }
        ],
        "profiles": {
            "default": { "jobType": "PyTorchJob", "jobSpecs": [spec("1", "4")] },
            "four": { "jobType": "PyTorchJob", "jobSpecs": [spec("4", "16")] },
            "eight": { "jobType": "PyTorchJob", "jobSpecs": [spec("8", "32")] },
            "empty": { "jobType": "PyTorchJob", "jobSpecs": [] }
        }
    });
    if !limits.is_null() {
        document["limits"] = limits;
    }
    document
}

/// Returns typed settings with `limits` applied.
pub fn settings(limits: Value) -> Settings {
    Settings::from_value(settings_value(limits)).unwrap()
}

/// Writes settings into a fresh directory and opens a store on it.
pub fn store(limits: Value) -> (TempDir, Arc<ConfigStore>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    write_settings(&path, &settings(limits)).unwrap();
    let store = ConfigStore::open(&path).unwrap();
    (dir, Arc::new(store))
}

/// Identity the router runs as.
pub fn identity() -> CallerIdentity {
    CallerIdentity {
        account_id: "1001".to_string(),
        user_id: USER_ID.to_string(),
        identity_type: "RAMUser".to_string(),
        arn: None,
    }
}

/// Assembled router plus handles to its collaborators.
pub struct Harness {
    pub _dir: TempDir,
    pub store: Arc<ConfigStore>,
    pub orchestrator: Arc<MockOrchestrator>,
    pub audit: Arc<RecordingAuditSink>,
    pub router: ToolRouter,
}

/// Builds a router over a temp store and the given job service.
pub fn harness(limits: Value, orchestrator: MockOrchestrator) -> Harness {
    let (dir, store) = store(limits);
    let orchestrator = Arc::new(orchestrator);
    let audit = Arc::new(RecordingAuditSink::default());
    let router = ToolRouter::new(ToolRouterConfig {
        store: Arc::clone(&store),
        orchestrator: Arc::clone(&orchestrator) as Arc<dyn JobOrchestrator>,
        identity: identity(),
        audit: Arc::clone(&audit) as Arc<dyn McpAuditSink>,
    });
    Harness {
        _dir: dir,
        store,
        orchestrator,
        audit,
        router,
    }
}
