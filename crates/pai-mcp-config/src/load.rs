// crates/pai-mcp-config/src/load.rs
// ============================================================================
// Module: Settings Loading
// Description: Path resolution and bounded, validated settings reads.
// Purpose: Produce a validated settings document at startup.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! The settings path resolves from an explicit argument, then the
//! `ALIYUN_PAI_SETTINGS_PATH` environment variable, then
//! `$HOME/.config/aliyun-pai/settings.json`. Reads are size-capped and must be
//! UTF-8 JSON; documents in the pre-0.5.0 layout are rejected outright.
//! Security posture: the path and file contents are untrusted; limits are
//! checked before parsing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::settings::Settings;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable overriding the settings path.
pub const SETTINGS_ENV_VAR: &str = "ALIYUN_PAI_SETTINGS_PATH";

/// Settings location relative to the home directory.
pub const DEFAULT_SETTINGS_RELATIVE: &str = ".config/aliyun-pai/settings.json";

/// Maximum settings file size in bytes.
pub const MAX_SETTINGS_FILE_SIZE: usize = 1024 * 1024;

/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Maximum length of any single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;

/// Top-level keys that only existed in the pre-0.5.0 layout.
const LEGACY_TOP_LEVEL_KEYS: [&str; 3] = ["jobSpecs", "jobType", "maxRunningJobs"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Settings loading errors.
#[derive(Debug, Error)]
pub enum LoadError {
    /// I/O failure while reading settings.
    #[error("settings io error: {0}")]
    Io(String),
    /// JSON parsing error.
    #[error("settings parse error: {0}")]
    Parse(String),
    /// Invalid settings data or path.
    #[error("invalid settings: {0}")]
    Invalid(String),
    /// Pre-0.5.0 document layout.
    #[error(
        "settings file {0} uses an outdated format (pre-0.5.0). Please re-initialize with the \
         'init' command."
    )]
    Legacy(String),
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Resolves the settings path from the process environment.
///
/// # Errors
///
/// Returns [`LoadError::Invalid`] when no path can be determined or a
/// candidate exceeds length limits.
pub fn resolve_settings_path(explicit: Option<&Path>) -> Result<PathBuf, LoadError> {
    let env_value = env::var(SETTINGS_ENV_VAR).ok();
    let home = env::var_os("HOME").map(PathBuf::from);
    resolve_settings_path_with(explicit, env_value.as_deref(), home.as_deref())
}

/// Resolves the settings path from explicit inputs.
///
/// # Errors
///
/// Returns [`LoadError::Invalid`] when no path can be determined or the
/// environment value exceeds length limits.
pub fn resolve_settings_path_with(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    home: Option<&Path>,
) -> Result<PathBuf, LoadError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(env_path) = env_value.map(str::trim).filter(|value| !value.is_empty()) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(LoadError::Invalid("settings path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    let home = home
        .filter(|home| !home.as_os_str().is_empty())
        .ok_or_else(|| LoadError::Invalid("HOME is not set; pass --settings".to_string()))?;
    Ok(home.join(DEFAULT_SETTINGS_RELATIVE))
}

/// Resolves, reads, and validates the settings document.
///
/// # Errors
///
/// Returns [`LoadError`] when resolution, reading, or validation fails.
pub fn load_settings(explicit: Option<&Path>) -> Result<(PathBuf, Settings), LoadError> {
    let resolved = resolve_settings_path(explicit)?;
    let settings = load_settings_from(&resolved)?;
    Ok((resolved, settings))
}

/// Reads and validates the settings document at `path`.
///
/// # Errors
///
/// Returns [`LoadError`] when the file is missing, oversized, not UTF-8, not
/// JSON, legacy, or fails validation.
pub fn load_settings_from(path: &Path) -> Result<Settings, LoadError> {
    validate_path(path)?;
    let file = File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            LoadError::Io(format!(
                "settings file not found at {}; run the 'init' command first",
                path.display()
            ))
        } else {
            LoadError::Io(err.to_string())
        }
    })?;
    let limit = u64::try_from(MAX_SETTINGS_FILE_SIZE).unwrap_or(u64::MAX);
    let declared = file.metadata().map_err(|err| LoadError::Io(err.to_string()))?.len();
    if declared > limit {
        return Err(size_limit_error());
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|err| LoadError::Io(err.to_string()))?;
    if bytes.len() > MAX_SETTINGS_FILE_SIZE {
        return Err(size_limit_error());
    }
    let content = std::str::from_utf8(&bytes)
        .map_err(|_| LoadError::Invalid("settings file must be utf-8".to_string()))?;
    parse_settings(content).map_err(|err| match err {
        LoadError::Legacy(_) => LoadError::Legacy(path.display().to_string()),
        other => other,
    })
}

/// Parses and validates settings text.
///
/// # Errors
///
/// Returns [`LoadError::Parse`] for malformed JSON, [`LoadError::Legacy`] for
/// the pre-0.5.0 layout, or [`LoadError::Invalid`] for schema violations.
pub fn parse_settings(content: &str) -> Result<Settings, LoadError> {
    let value: Value =
        serde_json::from_str(content).map_err(|err| LoadError::Parse(err.to_string()))?;
    if let Value::Object(map) = &value
        && LEGACY_TOP_LEVEL_KEYS.iter().any(|key| map.contains_key(*key))
    {
        return Err(LoadError::Legacy("<input>".to_string()));
    }
    Settings::from_value(value).map_err(|err| LoadError::Invalid(err.to_string()))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Error for files above [`MAX_SETTINGS_FILE_SIZE`].
fn size_limit_error() -> LoadError {
    LoadError::Invalid("settings file exceeds size limit".to_string())
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), LoadError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(LoadError::Invalid("settings path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(LoadError::Invalid("settings path component too long".to_string()));
        }
    }
    Ok(())
}
