// crates/pai-mcp-config/src/store.rs
// ============================================================================
// Module: Configuration Store
// Description: Serialized, diffing owner of the committed settings snapshot.
// Purpose: Apply partial, path-addressed, and profile mutations safely.
// Dependencies: serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`ConfigStore`] holds the last committed [`Settings`] snapshot and funnels
//! every mutation through one FIFO async mutex. A mutation reads the snapshot,
//! edits a JSON tree, enforces the locked-field policy, re-validates the
//! whole document, persists it atomically, and only then swaps the snapshot.
//! Reads never wait on pending mutations.
//! Security posture: locked fields are compared before and after every
//! mutation, so no addressing trick can change them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::load::LoadError;
use crate::load::load_settings_from;
use crate::path::FieldPath;
use crate::path::PathError;
use crate::path::get_path;
use crate::path::set_path;
use crate::persist::PersistError;
use crate::persist::write_settings;
use crate::settings::DEFAULT_PROFILE;
use crate::settings::LOCKED_FIELDS;
use crate::settings::Profile;
use crate::settings::Settings;
use crate::settings::SettingsError;
use crate::settings::check_profile_name;
use crate::settings::check_profile_name_format;
use crate::settings::locked_field_for;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of paths accepted by one [`ConfigStore::update_by_paths`].
pub const MAX_UPDATE_PATHS: usize = 50;

// ============================================================================
// SECTION: Diff Types
// ============================================================================

/// Before/after values of one changed path. Absent values are `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// Value before the mutation.
    pub from: Value,
    /// Value after the mutation.
    pub to: Value,
}

/// Changes committed by one mutation, keyed by canonical path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigDiff {
    /// Changed paths.
    pub changed: BTreeMap<String, FieldChange>,
}

impl ConfigDiff {
    /// Returns true when nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Returns the number of changed paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changed.len()
    }

    /// Returns the changed paths in order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.changed.keys().cloned().collect()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration store failures. None of them change committed state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Path failed parsing or could not be applied.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// Offending path.
        path: String,
        /// Rejection reason.
        reason: String,
    },
    /// Mutation touched a locked field.
    #[error(
        "Cannot modify locked field \"{field}\" (via '{path}'). This field requires \
         re-initialization via 'init' command."
    )]
    LockedFieldViolation {
        /// Locked field that would change.
        field: String,
        /// Path the caller supplied.
        path: String,
    },
    /// Resulting document does not validate.
    #[error("settings validation failed: {0}")]
    SchemaValidationFailure(String),
    /// Profile name fails the naming rule or is reserved.
    #[error("invalid profile name \"{name}\": {reason}")]
    InvalidProfileName {
        /// Rejected name.
        name: String,
        /// Rejection reason.
        reason: String,
    },
    /// Named profile does not exist.
    #[error("profile '{0}' not found")]
    ProfileNotFound(String),
    /// Profile cannot be deleted.
    #[error("cannot delete profile '{name}': {reason}")]
    CannotDelete {
        /// Profile name.
        name: String,
        /// Why deletion is refused.
        reason: String,
    },
    /// Too many paths in one call.
    #[error("too many updates: {count} paths supplied, maximum {max}")]
    TooManyUpdateKeys {
        /// Paths supplied.
        count: usize,
        /// Allowed maximum.
        max: usize,
    },
    /// Nothing to update.
    #[error("no updates provided; pass at least one field")]
    EmptyUpdate,
    /// Persistence failed; the committed snapshot is unchanged.
    #[error("settings io error: {0}")]
    Io(String),
}

impl From<PathError> for StoreError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::InvalidPath {
                path,
                reason,
            } => Self::InvalidPath {
                path,
                reason,
            },
        }
    }
}

impl From<SettingsError> for StoreError {
    fn from(err: SettingsError) -> Self {
        Self::SchemaValidationFailure(err.to_string())
    }
}

impl From<PersistError> for StoreError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Validation(err) => Self::SchemaValidationFailure(err.to_string()),
            PersistError::Io(message) => Self::Io(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Disk-backed settings store.
///
/// # Invariants
/// - The committed snapshot always validates and matches the file last
///   written by this instance.
/// - Mutations run one at a time in arrival order.
pub struct ConfigStore {
    /// Settings file location.
    path: PathBuf,
    /// Last committed snapshot.
    committed: RwLock<Arc<Settings>>,
    /// FIFO serialization point for read-modify-write-persist sequences.
    mutation: Mutex<()>,
}

impl ConfigStore {
    /// Creates a store around an already-validated document.
    #[must_use]
    pub fn new(path: PathBuf, settings: Settings) -> Self {
        Self {
            path,
            committed: RwLock::new(Arc::new(settings)),
            mutation: Mutex::new(()),
        }
    }

    /// Loads the document at `path` and wraps it in a store.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the file cannot be loaded.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let settings = load_settings_from(path)?;
        Ok(Self::new(path.to_path_buf(), settings))
    }

    /// Returns a deep copy of the committed snapshot.
    #[must_use]
    pub fn get(&self) -> Settings {
        self.snapshot().as_ref().clone()
    }

    /// Returns the committed snapshot without copying.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Settings> {
        match self.committed.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Returns a copy of every profile.
    #[must_use]
    pub fn get_profiles(&self) -> BTreeMap<String, Profile> {
        self.snapshot().profiles.clone()
    }

    /// Returns a copy of one profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ProfileNotFound`] when the name is absent.
    pub fn get_profile(&self, name: &str) -> Result<Profile, StoreError> {
        self.snapshot()
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::ProfileNotFound(name.to_string()))
    }

    /// Deep-merges a partial document into the settings.
    ///
    /// Objects merge key by key; arrays and scalars replace. The diff is
    /// keyed by the leaf paths of `partial`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the partial is not an object, touches a
    /// locked field, produces an invalid document, or cannot be persisted.
    pub async fn update(&self, partial: Value) -> Result<ConfigDiff, StoreError> {
        let Value::Object(partial) = partial else {
            return Err(StoreError::SchemaValidationFailure(
                "update must be a JSON object".to_string(),
            ));
        };
        if partial.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }
        let mut touched = Vec::new();
        collect_leaf_paths(&partial, &mut Vec::new(), &mut touched)?;
        for path in &touched {
            reject_locked_path(path)?;
        }
        self.mutate(move |document| {
            merge_objects(document, partial);
            Ok(touched)
        })
        .await
    }

    /// Writes individual values addressed by dot/bracket paths.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when no or too many paths are supplied, a path
    /// is malformed or locked, two paths collide, or the result is invalid.
    pub async fn update_by_paths(
        &self,
        updates: BTreeMap<String, Value>,
    ) -> Result<ConfigDiff, StoreError> {
        if updates.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }
        if updates.len() > MAX_UPDATE_PATHS {
            return Err(StoreError::TooManyUpdateKeys {
                count: updates.len(),
                max: MAX_UPDATE_PATHS,
            });
        }
        let mut parsed = Vec::with_capacity(updates.len());
        let mut seen = BTreeSet::new();
        for (raw, value) in updates {
            let path = FieldPath::parse(&raw)?;
            if !seen.insert(path.canonical()) {
                return Err(StoreError::InvalidPath {
                    path: raw,
                    reason: "duplicates another path after canonicalization".to_string(),
                });
            }
            reject_locked_path(&path)?;
            parsed.push((path, value));
        }
        self.mutate(move |document| {
            let mut touched = Vec::with_capacity(parsed.len());
            for (path, value) in parsed {
                set_path(document, &path, value)?;
                touched.push(path);
            }
            Ok(touched)
        })
        .await
    }

    /// Creates or replaces a named profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the name is invalid or reserved, the
    /// overrides carry locked keys or are not a valid profile, or the write
    /// fails.
    pub async fn set_profile(&self, name: &str, overrides: Value) -> Result<ConfigDiff, StoreError> {
        check_profile_name(name).map_err(|reason| StoreError::InvalidProfileName {
            name: name.to_string(),
            reason,
        })?;
        if let Value::Object(map) = &overrides
            && let Some(key) = map.keys().find(|key| locked_field_for(key).is_some())
        {
            return Err(StoreError::LockedFieldViolation {
                field: key.clone(),
                path: format!("profiles.{name}.{key}"),
            });
        }
        let profile = Profile::from_value(overrides)?;
        let profile_value = serde_json::to_value(&profile)
            .map_err(|err| StoreError::SchemaValidationFailure(err.to_string()))?;
        let name = name.to_string();
        self.mutate(move |document| {
            let target = FieldPath::from_keys(["profiles", name.as_str()])?;
            set_path(document, &target, profile_value)?;
            Ok(vec![
                FieldPath::from_keys(["profiles", name.as_str(), "jobType"])?,
                FieldPath::from_keys(["profiles", name.as_str(), "jobSpecs"])?,
            ])
        })
        .await
    }

    /// Activates a profile by copying its job type and job specs into the
    /// `default` profile used by implicit submissions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ProfileNotFound`] when the profile is absent,
    /// or another [`StoreError`] when the write fails.
    pub async fn apply_profile(&self, name: &str) -> Result<ConfigDiff, StoreError> {
        check_profile_name_format(name).map_err(|reason| StoreError::InvalidProfileName {
            name: name.to_string(),
            reason,
        })?;
        let name = name.to_string();
        self.mutate(move |document| {
            let source = FieldPath::from_keys(["profiles", name.as_str()])?;
            let profile = get_path(document, &source)
                .cloned()
                .ok_or_else(|| StoreError::ProfileNotFound(name.clone()))?;
            let mut touched = Vec::with_capacity(2);
            for key in ["jobType", "jobSpecs"] {
                let target = FieldPath::from_keys(["profiles", DEFAULT_PROFILE, key])?;
                let value = profile.get(key).cloned().unwrap_or(Value::Null);
                set_path(document, &target, value)?;
                touched.push(target);
            }
            Ok(touched)
        })
        .await
    }

    /// Deletes a named profile. The `default` profile cannot be deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CannotDelete`] for `default` or an absent name,
    /// [`StoreError::InvalidProfileName`] for a malformed or reserved name.
    pub async fn delete_profile(&self, name: &str) -> Result<ConfigDiff, StoreError> {
        check_profile_name_format(name).map_err(|reason| StoreError::InvalidProfileName {
            name: name.to_string(),
            reason,
        })?;
        if name == DEFAULT_PROFILE {
            return Err(StoreError::CannotDelete {
                name: name.to_string(),
                reason: "the default profile is required".to_string(),
            });
        }
        check_profile_name(name).map_err(|reason| StoreError::InvalidProfileName {
            name: name.to_string(),
            reason,
        })?;
        let name = name.to_string();
        self.mutate(move |document| {
            let removed = document
                .get_mut("profiles")
                .and_then(Value::as_object_mut)
                .and_then(|profiles| profiles.remove(&name));
            if removed.is_none() {
                return Err(StoreError::CannotDelete {
                    name: name.clone(),
                    reason: "profile does not exist".to_string(),
                });
            }
            Ok(vec![FieldPath::from_keys(["profiles", name.as_str()])?])
        })
        .await
    }

    /// Runs one serialized read-modify-validate-persist-swap cycle.
    async fn mutate<F>(&self, edit: F) -> Result<ConfigDiff, StoreError>
    where
        F: FnOnce(&mut Value) -> Result<Vec<FieldPath>, StoreError>,
    {
        let _guard = self.mutation.lock().await;
        let current = self.snapshot();
        let before = current.to_value()?;
        let mut document = before.clone();
        let touched = edit(&mut document)?;
        enforce_locked_values(&before, &document, &touched)?;
        let next = Settings::from_value(document)?;
        let after = next.to_value()?;
        let diff = compute_diff(&before, &after, &touched);
        if diff.is_empty() {
            return Ok(diff);
        }
        let path = self.path.clone();
        let to_write = next.clone();
        tokio::task::spawn_blocking(move || write_settings(&path, &to_write))
            .await
            .map_err(|err| StoreError::Io(err.to_string()))??;
        match self.committed.write() {
            Ok(mut guard) => *guard = Arc::new(next),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(next),
        }
        Ok(diff)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects a caller-supplied path at or beneath a locked field.
fn reject_locked_path(path: &FieldPath) -> Result<(), StoreError> {
    let canonical = path.canonical();
    match locked_field_for(&canonical) {
        Some(field) => Err(StoreError::LockedFieldViolation {
            field: field.to_string(),
            path: canonical,
        }),
        None => Ok(()),
    }
}

/// Fails when any locked field differs between `before` and `after`.
fn enforce_locked_values(
    before: &Value,
    after: &Value,
    touched: &[FieldPath],
) -> Result<(), StoreError> {
    for field in LOCKED_FIELDS {
        let Ok(locked) = FieldPath::parse(field) else {
            continue;
        };
        if get_path(before, &locked) != get_path(after, &locked) {
            let via = touched
                .iter()
                .map(FieldPath::canonical)
                .find(|path| field == path.as_str() || field.starts_with(&format!("{path}.")))
                .unwrap_or_else(|| field.to_string());
            return Err(StoreError::LockedFieldViolation {
                field: field.to_string(),
                path: via,
            });
        }
    }
    Ok(())
}

/// Collects the leaf key paths of a nested partial document.
fn collect_leaf_paths(
    map: &Map<String, Value>,
    prefix: &mut Vec<String>,
    out: &mut Vec<FieldPath>,
) -> Result<(), StoreError> {
    for (key, value) in map {
        prefix.push(key.clone());
        let path = FieldPath::from_keys(prefix.iter())?;
        match value {
            Value::Object(child) if !child.is_empty() => {
                collect_leaf_paths(child, prefix, out)?;
            }
            _ => out.push(path),
        }
        prefix.pop();
    }
    Ok(())
}

/// Deep-merges `partial` into `target`; non-objects replace.
fn merge_objects(target: &mut Value, partial: Map<String, Value>) {
    let Value::Object(target) = target else {
        *target = Value::Object(partial);
        return;
    };
    for (key, value) in partial {
        match (target.get_mut(&key), value) {
            (Some(existing @ Value::Object(_)), Value::Object(child)) => {
                merge_objects(existing, child);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Compares `before` and `after` at each touched path.
fn compute_diff(before: &Value, after: &Value, touched: &[FieldPath]) -> ConfigDiff {
    let mut changed = BTreeMap::new();
    for path in touched {
        let from = get_path(before, path).cloned().unwrap_or(Value::Null);
        let to = get_path(after, path).cloned().unwrap_or(Value::Null);
        if from != to {
            changed.insert(path.canonical(), FieldChange {
                from,
                to,
            });
        }
    }
    ConfigDiff {
        changed,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
