// crates/pai-mcp-config/src/persist.rs
// ============================================================================
// Module: Atomic Settings Persistence
// Description: Validated, crash-safe writes of the settings document.
// Purpose: Guarantee the file on disk is always the old or the new document.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`write_settings`] validates before touching disk, serializes to a unique
//! temporary file in the target directory, restricts it to owner read/write,
//! syncs it, and renames it over the target. A failure at any step removes
//! the temporary file and leaves the target untouched.
//! Security posture: the settings file carries credentials; it is never
//! world-readable and never partially written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use thiserror::Error;

use crate::settings::Settings;
use crate::settings::SettingsError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Attempts made to allocate a unique temporary file name.
const TEMP_ATTEMPTS: usize = 16;

/// Process-wide counter mixed into temporary file names.
static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Permission bits applied to the settings file on unix.
#[cfg(unix)]
const SETTINGS_FILE_MODE: u32 = 0o600;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Persistence failures.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Document failed validation; nothing was written.
    #[error("settings validation failed: {0}")]
    Validation(#[from] SettingsError),
    /// Filesystem failure; the target is unchanged.
    #[error("settings io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Validates and atomically writes `settings` to `path`.
///
/// # Errors
///
/// Returns [`PersistError::Validation`] before any filesystem access when the
/// document is invalid, or [`PersistError::Io`] when writing fails.
pub fn write_settings(path: &Path, settings: &Settings) -> Result<(), PersistError> {
    settings.validate()?;
    let mut bytes =
        serde_json::to_vec_pretty(settings).map_err(|err| PersistError::Io(err.to_string()))?;
    bytes.push(b'\n');
    write_atomic_with(path, &bytes, |_| Ok(()))
}

// ============================================================================
// SECTION: Internals
// ============================================================================

/// Writes `bytes` through a temporary file, calling `before_rename` with the
/// temporary path once it is fully written.
pub(crate) fn write_atomic_with<F>(
    path: &Path,
    bytes: &[u8],
    before_rename: F,
) -> Result<(), PersistError>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| PersistError::Io(err.to_string()))?;
    }
    let (temp_path, mut file) = create_temp_output(path)?;
    let written = restrict_permissions(&file)
        .and_then(|()| file.write_all(bytes))
        .and_then(|()| file.sync_all())
        .and_then(|()| before_rename(&temp_path))
        .and_then(|()| fs::rename(&temp_path, path));
    drop(file);
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(PersistError::Io(err.to_string()));
    }
    Ok(())
}

/// Creates a unique temporary file alongside the destination.
fn create_temp_output(path: &Path) -> Result<(PathBuf, fs::File), PersistError> {
    let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
    let parent = parent.unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PersistError::Io("settings path does not include a file name".to_string()))?;
    for _ in 0 .. TEMP_ATTEMPTS {
        let attempt = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_name = format!(".{file_name}.tmp.{}.{}", std::process::id(), attempt);
        let temp_path = parent.join(temp_name);
        match OpenOptions::new().write(true).create_new(true).open(&temp_path) {
            Ok(file) => return Ok((temp_path, file)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(PersistError::Io(err.to_string())),
        }
    }
    Err(PersistError::Io("failed to allocate temporary settings path".to_string()))
}

/// Restricts the file to owner read/write.
#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(SETTINGS_FILE_MODE))
}

/// Permissions are left to the platform default off unix.
#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
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

    use std::fs;

    use super::write_atomic_with;

    #[test]
    fn failure_before_rename_keeps_target_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("settings.json");
        fs::write(&target, b"old").unwrap();

        let result = write_atomic_with(&target, b"new", |_| {
            Err(std::io::Error::other("simulated crash"))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&target).unwrap(), b"old");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name() != "settings.json")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("settings.json");
        write_atomic_with(&target, b"{}", |_| Ok(())).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"{}");
    }
}
