// crates/pai-mcp-config/src/settings.rs
// ============================================================================
// Module: Settings Document
// Description: Typed settings model and structural validation.
// Purpose: Define the single persisted document every component reads.
// Dependencies: pai-mcp-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The settings document is strict everywhere except inside job-spec records:
//! unknown keys are rejected by serde, and [`Settings::validate`] enforces the
//! value-level rules (non-empty identifiers, positive limits, profile naming,
//! and the mandatory `default` profile). A document that passes
//! [`Settings::from_value`] satisfies the full settings schema.
//! Security posture: the identity and credential group is locked; see
//! [`LOCKED_FIELDS`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use pai_mcp_core::JobSpec;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Settings format version written by this release.
pub const CURRENT_VERSION: &str = "0.5.0";

/// Name of the profile used when a submission names none.
pub const DEFAULT_PROFILE: &str = "default";

/// Profile names that cannot be created through profile management.
pub const RESERVED_PROFILE_NAMES: [&str; 2] = ["default", "current"];

/// Fields that only the initialization flow may write.
pub const LOCKED_FIELDS: [&str; 8] = [
    "credentials",
    "regionId",
    "workspaceId",
    "resourceId",
    "projectPrefix",
    "codeSource.codeSourceId",
    "caller",
    "version",
];

/// Default concurrency ceiling when `limits.maxRunningJobs` is unset.
pub const DEFAULT_MAX_RUNNING_JOBS: u64 = 1;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Persisted settings document.
///
/// # Invariants
/// - `profiles` always contains [`DEFAULT_PROFILE`].
/// - Locked fields change only through re-initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    /// Settings format version.
    pub version: String,
    /// Prefix for every job display name created by this installation.
    pub project_prefix: String,
    /// Cloud region.
    pub region_id: String,
    /// Workspace jobs are created in.
    pub workspace_id: String,
    /// Resource quota jobs consume.
    pub resource_id: String,
    /// API credentials.
    pub credentials: Credentials,
    /// Identity cached at initialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<CallerInfo>,
    /// Code checkout attached to jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_source: Option<CodeSource>,
    /// Data source mounts attached to every job.
    #[serde(default)]
    pub mounts: Vec<Mount>,
    /// Global concurrency and quota ceilings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,
    /// Named job presets.
    pub profiles: BTreeMap<String, Profile>,
}

/// API credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Credentials {
    /// Access key id.
    pub access_key_id: String,
    /// Access key secret.
    pub access_key_secret: String,
    /// Session token for temporary credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_token: Option<String>,
}

/// Cached caller identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CallerInfo {
    /// Account id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// User id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Identity type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
}

/// Repository checkout descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CodeSource {
    /// Registered code source id (locked).
    pub code_source_id: String,
    /// Container path of the checkout.
    pub mount_path: String,
    /// Branch used when a submission names none.
    pub default_branch: String,
    /// Commit pinned when a submission names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_commit: Option<String>,
}

/// Mount access mode in settings vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountAccess {
    /// Read-only mount.
    ReadOnly,
    /// Read-write mount.
    ReadWrite,
}

impl MountAccess {
    /// Returns the literal the orchestration API expects.
    #[must_use]
    pub const fn api_value(self) -> &'static str {
        match self {
            Self::ReadOnly => "RO",
            Self::ReadWrite => "ReadWrite",
        }
    }
}

/// Data source mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Mount {
    /// Human-readable mount name.
    pub name: String,
    /// Storage URI.
    pub uri: String,
    /// Container mount path.
    pub mount_path: String,
    /// Access mode.
    pub mount_access: MountAccess,
    /// Extra mount options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Global ceilings, independent of profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    /// Maximum concurrently active jobs.
    #[serde(rename = "maxRunningJobs", default, skip_serializing_if = "Option::is_none")]
    pub max_running_jobs: Option<u64>,
    /// Maximum aggregate GPUs across active jobs.
    #[serde(rename = "maxGPU", default, skip_serializing_if = "Option::is_none")]
    pub max_gpu: Option<u64>,
    /// Maximum aggregate CPU cores across active jobs.
    #[serde(rename = "maxCPU", default, skip_serializing_if = "Option::is_none")]
    pub max_cpu: Option<u64>,
}

/// Named job preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Profile {
    /// Framework type.
    pub job_type: String,
    /// Job-spec records; opaque beyond the keys admission reads.
    pub job_specs: Vec<JobSpec>,
}

// ============================================================================
// SECTION: Construction and Validation
// ============================================================================

impl Settings {
    /// Decodes and validates a settings document.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the value does not match the schema.
    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        let settings: Self =
            serde_json::from_value(value).map_err(|err| SettingsError::new(vec![err.to_string()]))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Encodes the settings as a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when serialization fails.
    pub fn to_value(&self) -> Result<Value, SettingsError> {
        serde_json::to_value(self).map_err(|err| SettingsError::new(vec![err.to_string()]))
    }

    /// Validates value-level rules serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] listing every violation as `path: message`.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut issues = Vec::new();
        if self.version != CURRENT_VERSION {
            issues.push(format!(
                "version: unsupported settings version \"{}\" (expected \"{CURRENT_VERSION}\")",
                self.version
            ));
        }
        require_non_empty(&mut issues, "projectPrefix", &self.project_prefix);
        require_non_empty(&mut issues, "regionId", &self.region_id);
        require_non_empty(&mut issues, "workspaceId", &self.workspace_id);
        require_non_empty(&mut issues, "resourceId", &self.resource_id);
        require_non_empty(&mut issues, "credentials.accessKeyId", &self.credentials.access_key_id);
        require_non_empty(
            &mut issues,
            "credentials.accessKeySecret",
            &self.credentials.access_key_secret,
        );
        if let Some(token) = &self.credentials.security_token {
            require_non_empty(&mut issues, "credentials.securityToken", token);
        }
        if let Some(code_source) = &self.code_source {
            require_non_empty(&mut issues, "codeSource.codeSourceId", &code_source.code_source_id);
            require_non_empty(&mut issues, "codeSource.mountPath", &code_source.mount_path);
            require_non_empty(&mut issues, "codeSource.defaultBranch", &code_source.default_branch);
        }
        for (index, mount) in self.mounts.iter().enumerate() {
            require_non_empty(&mut issues, &format!("mounts.{index}.name"), &mount.name);
            require_non_empty(&mut issues, &format!("mounts.{index}.uri"), &mount.uri);
            require_non_empty(&mut issues, &format!("mounts.{index}.mountPath"), &mount.mount_path);
            if let Some(description) = &mount.description {
                require_non_empty(&mut issues, &format!("mounts.{index}.description"), description);
            }
        }
        if let Some(limits) = &self.limits
            && limits.max_running_jobs == Some(0)
        {
            issues.push("limits.maxRunningJobs: must be at least 1".to_string());
        }
        if !self.profiles.contains_key(DEFAULT_PROFILE) {
            issues.push(format!("profiles: must contain a \"{DEFAULT_PROFILE}\" profile"));
        }
        for (name, profile) in &self.profiles {
            if let Err(reason) = check_profile_name_format(name) {
                issues.push(format!("profiles.{name}: {reason}"));
            } else if name == "current" {
                issues.push(format!("profiles.{name}: profile name is reserved"));
            }
            require_non_empty(&mut issues, &format!("profiles.{name}.jobType"), &profile.job_type);
        }
        if issues.is_empty() { Ok(()) } else { Err(SettingsError::new(issues)) }
    }

    /// Returns the effective concurrency ceiling.
    #[must_use]
    pub fn max_running_jobs(&self) -> u64 {
        self.limits
            .and_then(|limits| limits.max_running_jobs)
            .unwrap_or(DEFAULT_MAX_RUNNING_JOBS)
    }
}

impl Profile {
    /// Decodes a profile from untrusted JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the value is not a valid profile.
    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        let profile: Self =
            serde_json::from_value(value).map_err(|err| SettingsError::new(vec![err.to_string()]))?;
        if profile.job_type.trim().is_empty() {
            return Err(SettingsError::new(vec!["jobType: must be non-empty".to_string()]));
        }
        Ok(profile)
    }
}

/// Checks the `^[a-z0-9-]+$` naming rule.
///
/// # Errors
///
/// Returns a reason string when the name does not match.
pub fn check_profile_name_format(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".to_string());
    }
    if !name.bytes().all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-')
    {
        return Err("must match ^[a-z0-9-]+$ (lowercase alphanumeric and hyphens only)".to_string());
    }
    Ok(())
}

/// Checks the naming rule and the reserved-word list.
///
/// # Errors
///
/// Returns a reason string when the name is malformed or reserved.
pub fn check_profile_name(name: &str) -> Result<(), String> {
    check_profile_name_format(name)?;
    if RESERVED_PROFILE_NAMES.contains(&name) {
        return Err("name is reserved and cannot be used".to_string());
    }
    Ok(())
}

/// Returns the locked field covering `path`, if any.
#[must_use]
pub fn locked_field_for(canonical_path: &str) -> Option<&'static str> {
    LOCKED_FIELDS.iter().copied().find(|locked| {
        canonical_path == *locked
            || canonical_path.strip_prefix(locked).is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Records an issue when `value` is blank.
fn require_non_empty(issues: &mut Vec<String>, path: &str, value: &str) {
    if value.trim().is_empty() {
        issues.push(format!("{path}: must be non-empty"));
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Settings schema violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .issues.join("; "))]
pub struct SettingsError {
    /// Individual `path: message` violations.
    pub issues: Vec<String>,
}

impl SettingsError {
    /// Builds an error from a list of issues.
    #[must_use]
    pub const fn new(issues: Vec<String>) -> Self {
        Self {
            issues,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
