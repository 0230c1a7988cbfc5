// crates/pai-mcp-config/src/schema.rs
// ============================================================================
// Module: Settings Schema
// Description: JSON Schema and field catalog for the settings document.
// Purpose: Publish the document shape to tooling and tool callers.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`settings_schema`] returns a Draft 2020-12 JSON Schema equivalent to the
//! serde model plus [`crate::Settings::validate`]. [`field_catalog`] groups
//! the mutable fields with descriptions and current values so a caller can
//! discover what `pai_config_update` accepts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::path::FieldPath;
use crate::path::get_path;
use crate::settings::CURRENT_VERSION;
use crate::settings::DEFAULT_MAX_RUNNING_JOBS;
use crate::settings::RESERVED_PROFILE_NAMES;
use crate::settings::Settings;

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Returns the JSON Schema for the settings document.
#[must_use]
pub fn settings_schema() -> Value {
    let non_empty = json!({ "type": "string", "minLength": 1 });
    let job_spec = json!({
        "type": "object",
        "description": "Job-spec record; keys beyond these are passed through to the API.",
        "properties": {
            "type": { "type": "string" },
            "image": { "type": "string" },
            "podCount": { "type": "integer", "minimum": 0 },
            "resourceConfig": {
                "type": "object",
                "properties": {
                    "GPU": { "type": "string" },
                    "CPU": { "type": "string" },
                    "memory": { "type": "string" },
                    "sharedMemory": { "type": "string" }
                }
            }
        },
        "additionalProperties": true
    });
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://pai-mcp.local/schemas/settings.json",
        "title": "PAI MCP settings",
        "type": "object",
        "required": [
            "version",
            "projectPrefix",
            "regionId",
            "workspaceId",
            "resourceId",
            "credentials",
            "profiles"
        ],
        "properties": {
            "version": { "const": CURRENT_VERSION },
            "projectPrefix": non_empty,
            "regionId": non_empty,
            "workspaceId": non_empty,
            "resourceId": non_empty,
            "credentials": {
                "type": "object",
                "required": ["accessKeyId", "accessKeySecret"],
                "properties": {
                    "accessKeyId": non_empty,
                    "accessKeySecret": non_empty,
                    "securityToken": non_empty
                },
                "additionalProperties": false
            },
            "caller": {
                "type": "object",
                "properties": {
                    "accountId": { "type": "string" },
                    "userId": { "type": "string" },
                    "identityType": { "type": "string" }
                },
                "additionalProperties": false
            },
            "codeSource": {
                "type": "object",
                "required": ["codeSourceId", "mountPath", "defaultBranch"],
                "properties": {
                    "codeSourceId": non_empty,
                    "mountPath": non_empty,
                    "defaultBranch": non_empty,
                    "defaultCommit": { "type": "string" }
                },
                "additionalProperties": false
            },
            "mounts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "uri", "mountPath", "mountAccess"],
                    "properties": {
                        "name": non_empty,
                        "uri": non_empty,
                        "mountPath": non_empty,
                        "mountAccess": { "enum": ["ReadOnly", "ReadWrite"] },
                        "options": { "type": "string" },
                        "description": non_empty
                    },
                    "additionalProperties": false
                }
            },
            "limits": {
                "type": "object",
                "properties": {
                    "maxRunningJobs": { "type": "integer", "minimum": 1 },
                    "maxGPU": { "type": "integer", "minimum": 0 },
                    "maxCPU": { "type": "integer", "minimum": 0 }
                },
                "additionalProperties": false
            },
            "profiles": {
                "type": "object",
                "required": ["default"],
                "propertyNames": {
                    "pattern": "^[a-z0-9-]+$",
                    "not": { "const": "current" }
                },
                "additionalProperties": {
                    "type": "object",
                    "required": ["jobType", "jobSpecs"],
                    "properties": {
                        "jobType": non_empty,
                        "jobSpecs": { "type": "array", "items": job_spec }
                    },
                    "additionalProperties": false
                }
            }
        },
        "additionalProperties": false
    })
}

// ============================================================================
// SECTION: Field Catalog
// ============================================================================

/// One mutable field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Path accepted by `pai_config_update`.
    pub path: String,
    /// JSON type name.
    #[serde(rename = "type")]
    pub field_type: &'static str,
    /// What the field controls.
    pub description: &'static str,
    /// Allowed values or formats.
    pub constraints: Value,
    /// Value in the committed settings, `null` when unset.
    pub current_value: Value,
    /// Whether `pai_config_update` may change it.
    pub modifiable: bool,
}

/// Related fields.
#[derive(Debug, Clone, Serialize)]
pub struct FieldGroup {
    /// Group title.
    pub name: &'static str,
    /// Group description.
    pub description: &'static str,
    /// Member fields.
    pub fields: Vec<FieldDescriptor>,
}

/// Describes the mutable fields of `settings` with their current values.
#[must_use]
pub fn field_catalog(settings: &Settings) -> Vec<FieldGroup> {
    let document = serde_json::to_value(settings).unwrap_or(Value::Null);
    let field = |path: &str,
                 field_type: &'static str,
                 description: &'static str,
                 constraints: Value| FieldDescriptor {
        path: path.to_string(),
        field_type,
        description,
        constraints,
        current_value: lookup(&document, path),
        modifiable: true,
    };
    let spec = "profiles.default.jobSpecs[0]";
    let mut concurrency = field(
        "limits.maxRunningJobs",
        "integer",
        "Maximum active jobs under this project prefix. Submissions beyond it are rejected.",
        json!({ "min": 1, "default": DEFAULT_MAX_RUNNING_JOBS }),
    );
    if concurrency.current_value.is_null() {
        concurrency.current_value = json!(DEFAULT_MAX_RUNNING_JOBS);
    }
    vec![
        FieldGroup {
            name: "Job Resources",
            description: "GPU, CPU, memory, and shared memory allocated to each worker pod.",
            fields: vec![
                field(
                    &format!("{spec}.resourceConfig.GPU"),
                    "string",
                    "GPUs per worker pod, as a decimal string.",
                    json!({ "examples": ["1", "2", "4", "8"] }),
                ),
                field(
                    &format!("{spec}.resourceConfig.CPU"),
                    "string",
                    "CPU cores per worker pod, as a decimal string.",
                    json!({ "examples": ["4", "8", "16", "32"] }),
                ),
                field(
                    &format!("{spec}.resourceConfig.memory"),
                    "string",
                    "Main memory per worker pod.",
                    json!({ "format": "<number>Gi", "examples": ["32Gi", "64Gi"] }),
                ),
                field(
                    &format!("{spec}.resourceConfig.sharedMemory"),
                    "string",
                    "Shared memory (/dev/shm) per worker pod.",
                    json!({ "format": "<number>Gi", "examples": ["16Gi", "32Gi"] }),
                ),
            ],
        },
        FieldGroup {
            name: "Docker Image",
            description: "Container image used for job workers.",
            fields: vec![field(
                &format!("{spec}.image"),
                "string",
                "Full image URI reachable from the training cluster.",
                json!({ "format": "registry/repository:tag" }),
            )],
        },
        FieldGroup {
            name: "Job Type",
            description: "Distributed training framework type.",
            fields: vec![field(
                "profiles.default.jobType",
                "string",
                "Framework that orchestrates the workers.",
                json!({ "enum": ["PyTorchJob", "TFJob", "MPIJob", "XGBoostJob", "RayJob"] }),
            )],
        },
        FieldGroup {
            name: "Pod Count",
            description: "Number of worker pods for distributed training.",
            fields: vec![field(
                &format!("{spec}.podCount"),
                "integer",
                "Worker pods launched per spec.",
                json!({ "min": 1 }),
            )],
        },
        FieldGroup {
            name: "Code Source",
            description: "Repository checkout attached to every job.",
            fields: vec![
                field(
                    "codeSource.defaultBranch",
                    "string",
                    "Branch used when a submission names none.",
                    json!({}),
                ),
                field(
                    "codeSource.defaultCommit",
                    "string",
                    "Commit pinned when a submission names none.",
                    json!({}),
                ),
                field(
                    "codeSource.mountPath",
                    "string",
                    "Container path of the checkout.",
                    json!({}),
                ),
            ],
        },
        FieldGroup {
            name: "Mounts",
            description: "Data source mounts attached to job containers. Replace the whole array.",
            fields: vec![field(
                "mounts",
                "array",
                "Mounts with name, uri, mountPath, mountAccess, and optional options/description.",
                json!({
                    "itemSchema": {
                        "name": "string (required)",
                        "uri": "string (required)",
                        "mountPath": "string (required)",
                        "mountAccess": { "enum": ["ReadOnly", "ReadWrite"] },
                        "options": "string (optional)",
                        "description": "string (optional)"
                    }
                }),
            )],
        },
        FieldGroup {
            name: "Limits",
            description: "Global ceilings checked at submission time.",
            fields: vec![
                concurrency,
                field(
                    "limits.maxGPU",
                    "integer",
                    "Maximum GPUs across active jobs plus the new submission.",
                    json!({ "min": 0 }),
                ),
                field(
                    "limits.maxCPU",
                    "integer",
                    "Maximum CPU cores across active jobs plus the new submission.",
                    json!({ "min": 0 }),
                ),
            ],
        },
        FieldGroup {
            name: "Profiles",
            description: "Named job presets managed with the pai_config_*_profile tools.",
            fields: vec![FieldDescriptor {
                path: "profiles".to_string(),
                field_type: "object",
                description: "Profile names mapped to jobType and jobSpecs.",
                constraints: json!({
                    "keyPattern": "^[a-z0-9-]+$",
                    "reservedNames": RESERVED_PROFILE_NAMES,
                }),
                current_value: json!(settings.profiles.keys().collect::<Vec<_>>()),
                modifiable: true,
            }],
        },
    ]
}

/// Reads a catalog path from the document, `null` when absent.
fn lookup(document: &Value, path: &str) -> Value {
    FieldPath::parse(path)
        .ok()
        .and_then(|path| get_path(document, &path).cloned())
        .unwrap_or(Value::Null)
}
