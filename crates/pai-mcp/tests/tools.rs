//! Tool router tests for pai-mcp.
// crates/pai-mcp/tests/tools.rs
// =============================================================================
// Module: Tool Router Tests
// Description: Config tools, ownership checks, logs, waiting, and submission.
// Purpose: Ensure each tool maps onto its collaborator with stable error codes.
// =============================================================================

#![allow(
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    reason = "Test-only diagnostics in failure messages."
)]

use pai_mcp::ToolError;
use pai_mcp::ToolOutput;
use serde_json::Value;
use serde_json::json;

mod common;

use common::Harness;
use common::MockOrchestrator;
use common::detail;
use common::harness;
use common::job;

type TestResult = Result<(), String>;

async fn call(harness: &Harness, tool: &str, args: Value) -> Result<ToolOutput, ToolError> {
    harness.router.handle_tool_call(tool, args).await
}

async fn call_json(harness: &Harness, tool: &str, args: Value) -> Result<Value, String> {
    match call(harness, tool, args).await {
        Ok(ToolOutput::Json(value)) => Ok(value),
        other => Err(format!("{tool}: expected json output, got {other:?}")),
    }
}

async fn call_code(harness: &Harness, tool: &str, args: Value) -> Result<i64, String> {
    match call(harness, tool, args).await {
        Err(error) => Ok(error.code()),
        Ok(output) => Err(format!("{tool}: expected an error, got {output:?}")),
    }
}

fn with_owned_job(status: &str) -> MockOrchestrator {
    let orchestrator = MockOrchestrator::default();
    orchestrator.add_detail(detail(
        job("dlc-1", "alice-train-20260304050607", status, "1", "4"),
        &["p0", "p1"],
    ));
    orchestrator
}

// -----------------------------------------------------------------------------
// Config tools
// -----------------------------------------------------------------------------

#[tokio::test]
async fn locked_field_update_is_refused() -> TestResult {
    let harness = harness(Value::Null, MockOrchestrator::default());
    let code = call_code(&harness, "pai_config_update", json!({
        "updates": { "regionId": "cn-beijing" }
    }))
    .await?;
    assert_eq!(code, -32011);
    assert_eq!(harness.store.snapshot().region_id, "cn-hangzhou");
    assert!(harness.audit.events_named("config_change").is_empty());
    Ok(())
}

#[tokio::test]
async fn profile_scoped_update_prefixes_paths() -> TestResult {
    let harness = harness(Value::Null, MockOrchestrator::default());
    let result = call_json(&harness, "pai_config_update", json!({
        "profile": "four",
        "updates": { "jobSpecs[0].podCount": 2 }
    }))
    .await?;
    assert_eq!(result["message"], "Updated 1 field(s).");
    assert_eq!(result["changed"]["profiles.four.jobSpecs.0.podCount"]["to"], 2);
    let profile = harness.store.get_profile("four").map_err(|err| err.to_string())?;
    assert_eq!(profile.job_specs[0]["podCount"], 2);

    let events = harness.audit.events_named("config_change");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["tool"], "pai_config_update");
    assert_eq!(events[0]["paths"], json!(["profiles.four.jobSpecs.0.podCount"]));
    Ok(())
}

#[tokio::test]
async fn profile_scoped_update_requires_existing_profile() -> TestResult {
    let harness = harness(Value::Null, MockOrchestrator::default());
    let code = call_code(&harness, "pai_config_update", json!({
        "profile": "ghost",
        "updates": { "jobType": "TFJob" }
    }))
    .await?;
    assert_eq!(code, -32004);
    Ok(())
}

#[tokio::test]
async fn repeated_update_reports_no_changes() -> TestResult {
    let harness = harness(json!({ "maxRunningJobs": 1 }), MockOrchestrator::default());
    let args = json!({ "updates": { "limits.maxRunningJobs": 3 } });
    let first = call_json(&harness, "pai_config_update", args.clone()).await?;
    assert_eq!(first["message"], "Updated 1 field(s).");
    let second = call_json(&harness, "pai_config_update", args).await?;
    assert_eq!(second["message"], "No changes detected; values are already set.");
    assert_eq!(second["changed"], json!({}));
    assert_eq!(harness.audit.events_named("config_change").len(), 1);
    Ok(())
}

#[tokio::test]
async fn config_output_never_carries_credentials() -> TestResult {
    let harness = harness(Value::Null, MockOrchestrator::default());
    let config = call_json(&harness, "pai_config", json!({})).await?;
    assert!(config.get("credentials").is_none());
    assert!(config.get("caller").is_none());
    assert_eq!(config["projectPrefix"], "alice");
    let schema = call_json(&harness, "pai_config_schema", json!({})).await?;
    let text = format!("{config}{schema}");
    assert!(!text.contains("secret-value-123"));
    assert!(schema["schema"].is_object());
    Ok(())
}

#[tokio::test]
async fn whoami_reports_identity_and_workspace() -> TestResult {
    let harness = harness(Value::Null, MockOrchestrator::default());
    let whoami = call_json(&harness, "pai_whoami", Value::Null).await?;
    assert_eq!(whoami["userId"], "2002");
    assert_eq!(whoami["regionId"], "cn-hangzhou");
    assert_eq!(whoami["workspaceId"], "ws-1");
    Ok(())
}

#[tokio::test]
async fn create_profile_from_current_merges_over_default() -> TestResult {
    let harness = harness(Value::Null, MockOrchestrator::default());
    call_json(&harness, "pai_config_create_profile", json!({
        "name": "two-gpu",
        "fromCurrent": true,
        "overrides": {
            "jobSpecs": [{ "type": "Worker", "podCount": 1, "resourceConfig": { "GPU": "2" } }]
        }
    }))
    .await?;
    let profile = harness.store.get_profile("two-gpu").map_err(|err| err.to_string())?;
    assert_eq!(profile.job_type, "PyTorchJob");
    assert_eq!(profile.job_specs[0]["resourceConfig"]["GPU"], "2");

    let code = call_code(&harness, "pai_config_create_profile", json!({
        "name": "partial",
        "overrides": { "jobSpecs": [] }
    }))
    .await?;
    assert_eq!(code, -32602);
    Ok(())
}

#[tokio::test]
async fn apply_and_delete_profiles() -> TestResult {
    let harness = harness(Value::Null, MockOrchestrator::default());
    let applied = call_json(&harness, "pai_config_apply_profile", json!({ "name": "four" })).await?;
    assert_eq!(applied["message"], "Profile \"four\" applied.");
    let default = harness.store.get_profile("default").map_err(|err| err.to_string())?;
    assert_eq!(default.job_specs[0]["resourceConfig"]["GPU"], "4");

    assert_eq!(call_code(&harness, "pai_config_delete_profile", json!({ "name": "default" })).await?, -32009);
    let deleted = call_json(&harness, "pai_config_delete_profile", json!({ "name": "four" })).await?;
    assert_eq!(deleted["message"], "Profile \"four\" deleted.");
    let profiles = call_json(&harness, "pai_config_list_profiles", json!({})).await?;
    let names: Vec<&str> =
        profiles.as_array().unwrap().iter().filter_map(|entry| entry["name"].as_str()).collect();
    assert_eq!(names, vec!["default", "eight", "empty"]);
    Ok(())
}

#[tokio::test]
async fn codesource_and_mounts_are_listed() -> TestResult {
    let harness = harness(Value::Null, MockOrchestrator::default());
    let code_source = call_json(&harness, "pai_codesource_get", json!({})).await?;
    assert_eq!(code_source["defaultBranch"], "main");
    let mounts = call_json(&harness, "pai_mounts_list", json!({})).await?;
    assert_eq!(mounts[0]["mountAccess"], "ReadOnly");
    Ok(())
}

// -----------------------------------------------------------------------------
// Job tools
// -----------------------------------------------------------------------------

#[tokio::test]
async fn job_list_filters_by_prefix_and_validates_limit() -> TestResult {
    let harness = harness(
        Value::Null,
        MockOrchestrator::with_jobs(vec![
            job("dlc-1", "alice-train-20260304050607", "Running", "1", "4"),
            job("dlc-2", "bob-train-20260304050607", "Running", "1", "4"),
        ]),
    );
    let jobs = call_json(&harness, "pai_job_list", json!({})).await?;
    assert_eq!(jobs.as_array().map(Vec::len), Some(1));
    assert_eq!(jobs[0]["jobId"], "dlc-1");
    assert_eq!(jobs[0]["gmtCreateTime"], "2026-03-04T05:06:07Z");
    assert_eq!(call_code(&harness, "pai_job_list", json!({ "limit": 0 })).await?, -32602);
    assert_eq!(call_code(&harness, "pai_job_list", json!({ "limit": 101 })).await?, -32602);
    Ok(())
}

#[tokio::test]
async fn job_get_reports_missing_jobs() -> TestResult {
    let harness = harness(Value::Null, with_owned_job("Running"));
    let found = call_json(&harness, "pai_job_get", json!({ "jobId": "dlc-1" })).await?;
    assert_eq!(found["displayName"], "alice-train-20260304050607");
    match call(&harness, "pai_job_get", json!({ "jobId": "nope" })).await {
        Err(error) => {
            assert_eq!(error.code(), -32004);
            assert_eq!(error.to_string(), "Job 'nope' not found.");
        }
        Ok(output) => return Err(format!("expected not found, got {output:?}")),
    }
    Ok(())
}

#[tokio::test]
async fn stop_refuses_jobs_outside_the_prefix() -> TestResult {
    let orchestrator = with_owned_job("Running");
    orchestrator.add_detail(detail(job("dlc-9", "bob-train-20260304050607", "Running", "1", "4"), &[]));
    let mut foreign_user = job("dlc-8", "alice-other-20260304050607", "Running", "1", "4");
    foreign_user.user_id = Some("9999".to_string());
    orchestrator.add_detail(detail(foreign_user, &[]));
    let harness = harness(Value::Null, orchestrator);

    assert_eq!(call_code(&harness, "pai_job_stop", json!({ "jobId": "dlc-9" })).await?, -32003);
    assert_eq!(call_code(&harness, "pai_job_stop", json!({ "jobId": "dlc-8" })).await?, -32003);
    assert!(harness.orchestrator.stopped_ids().is_empty());

    let stopped = call_json(&harness, "pai_job_stop", json!({ "jobId": "dlc-1" })).await?;
    assert_eq!(stopped, json!({ "jobId": "dlc-1", "result": "stopped" }));
    assert_eq!(harness.orchestrator.stopped_ids(), vec!["dlc-1".to_string()]);
    Ok(())
}

#[tokio::test]
async fn logs_default_to_first_pod() -> TestResult {
    let harness = harness(Value::Null, with_owned_job("Running"));
    let output = call(&harness, "pai_job_logs", json!({ "jobId": "dlc-1" }))
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(output, ToolOutput::Text("epoch 1\nepoch 2".to_string()));
    call(&harness, "pai_job_logs", json!({ "jobId": "dlc-1", "podId": "p1", "maxLines": 10 }))
        .await
        .map_err(|err| err.to_string())?;
    let requests = harness.orchestrator.log_requests.lock().unwrap().clone();
    assert_eq!(requests[0].1, "p0");
    assert_eq!(requests[0].2.max_lines, 200);
    assert_eq!(requests[0].2.pod_uid.as_deref(), Some("uid-p0"));
    assert_eq!(requests[1].1, "p1");
    assert_eq!(requests[1].2.max_lines, 10);

    let missing_pod = json!({ "jobId": "dlc-1", "podId": "zz" });
    assert_eq!(call_code(&harness, "pai_job_logs", missing_pod).await?, -32004);
    let too_many = json!({ "jobId": "dlc-1", "maxLines": 5001 });
    assert_eq!(call_code(&harness, "pai_job_logs", too_many).await?, -32602);
    Ok(())
}

#[tokio::test]
async fn submit_rejection_is_a_normal_result() -> TestResult {
    let harness = harness(
        Value::Null,
        MockOrchestrator::with_jobs(vec![job(
            "dlc-0",
            "alice-old-20260101000000",
            "Running",
            "1",
            "4",
        )]),
    );
    let output = call(&harness, "pai_job_submit", json!({ "name": "train", "command": "python x.py" }))
        .await
        .map_err(|err| err.to_string())?;
    let ToolOutput::Rejected(message) = output else {
        return Err(format!("expected rejection, got {output:?}"));
    };
    assert!(message.starts_with("Limit exceeded: maxRunningJobs (1)."));
    assert_eq!(harness.orchestrator.created_count(), 0);
    let events = harness.audit.events_named("job_admission");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["decision"], "rejected");
    assert_eq!(events[0]["rejection"], "max_running_jobs");
    Ok(())
}

#[tokio::test]
async fn submit_returns_job_and_summary() -> TestResult {
    let harness = harness(Value::Null, MockOrchestrator::default());
    let result = call_json(&harness, "pai_job_submit", json!({
        "name": "train",
        "command": "python train.py",
        "profile": "four"
    }))
    .await?;
    assert_eq!(result["jobId"], "dlc-1");
    assert!(result["displayName"].as_str().is_some_and(|name| name.starts_with("alice-train-")));
    assert_eq!(result["submitted"]["profile"], "four");
    assert_eq!(result["submitted"]["codeBranch"], "main");
    assert_eq!(result["submitted"]["mounts"], json!(["ds-0:/mnt/data(RO)"]));
    assert_eq!(harness.audit.events_named("job_admission")[0]["decision"], "approved");
    assert_eq!(call_code(&harness, "pai_job_submit", json!({ "name": "x" })).await?, -32602);
    Ok(())
}

// -----------------------------------------------------------------------------
// Job wait
// -----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn wait_returns_once_running() -> TestResult {
    let harness = harness(Value::Null, with_owned_job("Queuing"));
    harness.orchestrator.script_statuses(&["Queuing", "Queuing", "Running"]);
    let result = call_json(&harness, "pai_job_wait", json!({ "jobId": "dlc-1", "timeoutSec": 60 })).await?;
    assert_eq!(result["reached"], true);
    assert_eq!(result["status"], "Running");
    assert_eq!(result["duration"], 42);
    assert!(result.get("message").is_none());
    assert_eq!(harness.orchestrator.get_call_count(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn wait_timeout_is_not_an_error() -> TestResult {
    let harness = harness(Value::Null, with_owned_job("Queuing"));
    let result = call_json(&harness, "pai_job_wait", json!({ "jobId": "dlc-1" })).await?;
    assert_eq!(result["reached"], false);
    assert_eq!(
        result["message"],
        "Not yet 'Running' after 30s (current: 'Queuing'). Call pai_job_wait again to continue \
         waiting."
    );
    assert_eq!(harness.orchestrator.get_call_count(), 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn wait_stops_on_terminal_before_running() -> TestResult {
    let harness = harness(Value::Null, with_owned_job("Queuing"));
    harness.orchestrator.script_statuses(&["Queuing", "Failed"]);
    let result = call_json(&harness, "pai_job_wait", json!({ "jobId": "dlc-1" })).await?;
    assert_eq!(result["reached"], false);
    assert_eq!(result["message"], "Job reached terminal status 'Failed' before 'Running'.");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn wait_for_terminal_passes_through_running() -> TestResult {
    let harness = harness(Value::Null, with_owned_job("Running"));
    harness.orchestrator.script_statuses(&["Running", "Succeeded"]);
    let result = call_json(&harness, "pai_job_wait", json!({
        "jobId": "dlc-1",
        "target": "Terminal",
        "pollSec": 5
    }))
    .await?;
    assert_eq!(result["reached"], true);
    assert_eq!(result["status"], "Succeeded");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn wait_checks_ownership_and_arguments() -> TestResult {
    let orchestrator = MockOrchestrator::default();
    orchestrator.add_detail(detail(job("dlc-9", "bob-train-20260304050607", "Queuing", "1", "4"), &[]));
    let harness = harness(Value::Null, orchestrator);
    assert_eq!(call_code(&harness, "pai_job_wait", json!({ "jobId": "dlc-9" })).await?, -32003);
    assert_eq!(harness.orchestrator.get_call_count(), 1);
    for args in [
        json!({ "jobId": "dlc-9", "timeoutSec": 0 }),
        json!({ "jobId": "dlc-9", "timeoutSec": 3601 }),
        json!({ "jobId": "dlc-9", "pollSec": 0 }),
        json!({ "jobId": "dlc-9", "target": "Pending" }),
    ] {
        assert_eq!(call_code(&harness, "pai_job_wait", args).await?, -32602);
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Routing
// -----------------------------------------------------------------------------

#[tokio::test]
async fn unknown_tools_and_fields_are_rejected() -> TestResult {
    let harness = harness(Value::Null, MockOrchestrator::default());
    assert_eq!(call_code(&harness, "pai_nope", json!({})).await?, -32601);
    assert_eq!(call_code(&harness, "pai_config", json!({ "extra": 1 })).await?, -32602);
    let help = call(&harness, "pai_help", json!({})).await.map_err(|err| err.to_string())?;
    assert!(matches!(help, ToolOutput::Text(text) if text.contains("pai_job_submit")));
    Ok(())
}
