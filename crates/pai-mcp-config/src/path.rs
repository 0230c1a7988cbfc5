// crates/pai-mcp-config/src/path.rs
// ============================================================================
// Module: Field Path Addressing
// Description: Parsing and navigation of dot/bracket settings paths.
// Purpose: Turn untrusted path strings into bounded, typed segment lists.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Paths such as `mounts[0].name` or `profiles.default.jobSpecs.0.image` are
//! parsed into [`PathSegment`] lists. Bracket indices are equivalent to dotted
//! numeric segments, so both spellings share one canonical form
//! (`mounts.0.name`). Parsing rejects empty segments, depth beyond
//! [`MAX_PATH_DEPTH`], indices beyond [`MAX_PATH_INDEX`], and the
//! prototype-pollution names in [`DENIED_SEGMENTS`].
//! Security posture: paths are untrusted input; parsing never truncates or
//! coerces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of segments in one path.
pub const MAX_PATH_DEPTH: usize = 10;

/// Largest numeric segment accepted.
pub const MAX_PATH_INDEX: usize = 9999;

/// Segment names rejected anywhere in a path.
pub const DENIED_SEGMENTS: [&str; 3] = ["__proto__", "prototype", "constructor"];

// ============================================================================
// SECTION: Types
// ============================================================================

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index (or decimal object key when applied to an object).
    Index(usize),
}

impl PathSegment {
    /// Returns the key used when this segment addresses an object.
    #[must_use]
    pub fn as_key(&self) -> String {
        match self {
            Self::Key(key) => key.clone(),
            Self::Index(index) => index.to_string(),
        }
    }
}

/// Validated field path.
///
/// # Invariants
/// - Contains between 1 and [`MAX_PATH_DEPTH`] segments when parsed.
/// - No key segment is empty or in [`DENIED_SEGMENTS`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    /// Ordered segments.
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Parses a dot/bracket path string.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::InvalidPath`] naming the path and the reason.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let invalid = |reason: &str| PathError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };
        if raw.is_empty() {
            return Err(invalid("path is empty"));
        }
        let normalized = normalize_brackets(raw).map_err(|reason| invalid(&reason))?;
        let parts: Vec<&str> = normalized.split('.').collect();
        if parts.len() > MAX_PATH_DEPTH {
            return Err(invalid(&format!("path exceeds maximum depth of {MAX_PATH_DEPTH}")));
        }
        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            if part.is_empty() {
                return Err(invalid("path contains an empty segment"));
            }
            if part.bytes().all(|byte| byte.is_ascii_digit()) {
                let index = part
                    .parse::<usize>()
                    .ok()
                    .filter(|index| *index <= MAX_PATH_INDEX)
                    .ok_or_else(|| invalid(&format!("index exceeds maximum of {MAX_PATH_INDEX}")))?;
                segments.push(PathSegment::Index(index));
            } else {
                if DENIED_SEGMENTS.contains(&part) {
                    return Err(invalid(&format!("segment '{part}' is not allowed")));
                }
                segments.push(PathSegment::Key(part.to_string()));
            }
        }
        Ok(Self {
            segments,
        })
    }

    /// Builds a path from object keys collected out of a nested document.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::InvalidPath`] when a key is empty or denied.
    pub fn from_keys<I, S>(keys: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut segments = Vec::new();
        for key in keys {
            let key = key.as_ref();
            if key.is_empty() || DENIED_SEGMENTS.contains(&key) {
                let mut path: Vec<String> =
                    segments.iter().map(PathSegment::as_key).collect::<Vec<_>>();
                path.push(key.to_string());
                return Err(PathError::InvalidPath {
                    path: path.join("."),
                    reason: if key.is_empty() {
                        "path contains an empty segment".to_string()
                    } else {
                        format!("segment '{key}' is not allowed")
                    },
                });
            }
            segments.push(PathSegment::Key(key.to_string()));
        }
        Ok(Self {
            segments,
        })
    }

    /// Returns the segments in order.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns the canonical dotted form (`mounts.0.name`).
    #[must_use]
    pub fn canonical(&self) -> String {
        self.segments.iter().map(PathSegment::as_key).collect::<Vec<_>>().join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

// ============================================================================
// SECTION: Navigation
// ============================================================================

/// Returns the value at `path`, if present.
#[must_use]
pub fn get_path<'a>(root: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = match (node, segment) {
            (Value::Object(map), segment) => map.get(&segment.as_key())?,
            (Value::Array(items), PathSegment::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Writes `value` at `path`, creating missing containers along the way.
///
/// A missing container becomes an array when the next segment is numeric and
/// an object otherwise. Writing one past the end of an array appends.
///
/// # Errors
///
/// Returns [`PathError::InvalidPath`] when the path crosses a scalar, uses a
/// key on an array, or skips past the end of an array.
pub fn set_path(root: &mut Value, path: &FieldPath, value: Value) -> Result<(), PathError> {
    let Some((last, parents)) = path.segments().split_last() else {
        *root = value;
        return Ok(());
    };
    let mut node = root;
    for (position, segment) in parents.iter().enumerate() {
        let next_is_index = matches!(path.segments().get(position + 1), Some(PathSegment::Index(_)));
        node = child_or_create(node, segment, next_is_index, path)?;
    }
    match node {
        Value::Object(map) => {
            map.insert(last.as_key(), value);
            Ok(())
        }
        Value::Array(items) => match last {
            PathSegment::Index(index) if *index < items.len() => {
                items[*index] = value;
                Ok(())
            }
            PathSegment::Index(index) if *index == items.len() => {
                items.push(value);
                Ok(())
            }
            PathSegment::Index(index) => Err(out_of_bounds(path, *index, items.len())),
            PathSegment::Key(key) => Err(key_on_array(path, key)),
        },
        _ => Err(PathError::InvalidPath {
            path: path.canonical(),
            reason: "path crosses a non-container value".to_string(),
        }),
    }
}

/// Returns the child for `segment`, creating it when missing.
fn child_or_create<'a>(
    node: &'a mut Value,
    segment: &PathSegment,
    next_is_index: bool,
    path: &FieldPath,
) -> Result<&'a mut Value, PathError> {
    match node {
        Value::Object(map) => {
            let slot = map.entry(segment.as_key()).or_insert(Value::Null);
            if slot.is_null() {
                *slot = empty_container(next_is_index);
            }
            Ok(slot)
        }
        Value::Array(items) => match segment {
            PathSegment::Index(index) if *index < items.len() => {
                let slot = &mut items[*index];
                if slot.is_null() {
                    *slot = empty_container(next_is_index);
                }
                Ok(slot)
            }
            PathSegment::Index(index) if *index == items.len() => {
                items.push(empty_container(next_is_index));
                let last = items.len() - 1;
                Ok(&mut items[last])
            }
            PathSegment::Index(index) => Err(out_of_bounds(path, *index, items.len())),
            PathSegment::Key(key) => Err(key_on_array(path, key)),
        },
        _ => Err(PathError::InvalidPath {
            path: path.canonical(),
            reason: "path crosses a non-container value".to_string(),
        }),
    }
}

/// Builds an empty array or object.
fn empty_container(array: bool) -> Value {
    if array { Value::Array(Vec::new()) } else { Value::Object(Map::new()) }
}

/// Error for an index past the end of an array.
fn out_of_bounds(path: &FieldPath, index: usize, len: usize) -> PathError {
    PathError::InvalidPath {
        path: path.canonical(),
        reason: format!("index {index} is out of bounds for array of length {len}"),
    }
}

/// Error for a key segment applied to an array.
fn key_on_array(path: &FieldPath, key: &str) -> PathError {
    PathError::InvalidPath {
        path: path.canonical(),
        reason: format!("key '{key}' cannot address an array element"),
    }
}

/// Rewrites `[N]` as `.N`, rejecting malformed brackets.
fn normalize_brackets(raw: &str) -> Result<String, String> {
    let mut normalized = String::with_capacity(raw.len() + 4);
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '[' => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(digit) if digit.is_ascii_digit() => digits.push(digit),
                        Some(_) => {
                            return Err("bracket index must contain only digits".to_string());
                        }
                        None => return Err("unterminated bracket index".to_string()),
                    }
                }
                if digits.is_empty() {
                    return Err("bracket index is empty".to_string());
                }
                normalized.push('.');
                normalized.push_str(&digits);
                if !matches!(chars.peek(), None | Some('.' | '[')) {
                    return Err("bracket index must be followed by '.' or '['".to_string());
                }
            }
            ']' => return Err("unmatched ']'".to_string()),
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Path parsing and navigation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Path is malformed or cannot be applied to the document.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// Offending path as supplied.
        path: String,
        /// Why the path was rejected.
        reason: String,
    },
}

// ============================================================================
// SECTION: Tests
// ============================================================================
