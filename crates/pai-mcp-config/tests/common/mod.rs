// crates/pai-mcp-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared settings fixtures for store and loader tests.
// Purpose: Reduce duplication across integration tests for pai-mcp-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::path::PathBuf;

use pai_mcp_config::ConfigStore;
use pai_mcp_config::Settings;
use pai_mcp_config::write_settings;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

/// Returns a complete, valid settings document.
pub fn sample_settings_value() -> Value {
    json!({
        "version": "0.5.0",
        "projectPrefix": "alice",
        "regionId": "cn-hangzhou",
        "workspaceId": "ws-1",
        "resourceId": "quota-1",
        "credentials": {
            "accessKeyId": "LTAI1234567890abcd",
            "accessKeySecret": "secret-value-123"
        },
        "caller": {
            "accountId": "1001",
            "userId": "2002",
            "identityType": "RAMUser"
        },
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
            "default": {
                "jobType": "PyTorchJob",
                "jobSpecs": [
                    {
                        "type": "Worker",
                        "image": "registry/org/train:1",
                        "podCount": 1,
                        "resourceConfig": { "GPU": "1", "CPU": "4", "memory": "32Gi" }
                    }
                ]
            },
            "big": {
                "jobType": "PyTorchJob",
                "jobSpecs": [
                    {
                        "type": "Worker",
                        "image": "registry/org/train:1",
                        "podCount": 2,
                        "resourceConfig": { "GPU": "8", "CPU": "64" }
                    }
                ]
            }
        }
    })
}

/// Returns the sample document as typed settings.
pub fn sample_settings() -> Result<Settings, String> {
    Settings::from_value(sample_settings_value()).map_err(|err| err.to_string())
}

/// Writes the sample document into a fresh directory and opens a store on it.
pub fn sample_store() -> Result<(TempDir, PathBuf, ConfigStore), String> {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("settings.json");
    let settings = sample_settings()?;
    write_settings(&path, &settings).map_err(|err| err.to_string())?;
    let store = ConfigStore::open(&path).map_err(|err| err.to_string())?;
    Ok((dir, path, store))
}

/// Reads the settings file back as raw JSON.
pub fn read_disk(path: &std::path::Path) -> Result<Value, String> {
    let text = std::fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&text).map_err(|err| err.to_string())
}
