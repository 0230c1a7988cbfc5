// crates/pai-mcp-core/src/redact.rs
// ============================================================================
// Module: Secret Redaction
// Description: Masking of credential fields in caller-visible payloads.
// Purpose: Guarantee secrets never cross the tool boundary unmasked.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Redaction walks any JSON value and masks credential keys wherever they
//! appear: `accessKeySecret` and `securityToken` are replaced outright, and
//! `accessKeyId` keeps only its first and last four characters.
//! Security posture: every tool result passes through [`redact_value`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Replacement for fully redacted values.
pub const REDACTED: &str = "***REDACTED***";

/// Keys whose values are always fully redacted.
pub const SENSITIVE_KEYS: [&str; 2] = ["accessKeySecret", "securityToken"];

/// Keys whose values keep a short prefix and suffix.
pub const PARTIAL_REDACT_KEYS: [&str; 1] = ["accessKeyId"];

/// Characters kept at each end of a partially redacted value.
const VISIBLE_EDGE: usize = 4;

// ============================================================================
// SECTION: Redaction
// ============================================================================

/// Masks a value, keeping the first and last four characters.
///
/// Values of eight characters or fewer are fully redacted.
#[must_use]
pub fn partially_redact(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= VISIBLE_EDGE * 2 {
        return REDACTED.to_string();
    }
    let head: String = chars[.. VISIBLE_EDGE].iter().collect();
    let tail: String = chars[chars.len() - VISIBLE_EDGE ..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - VISIBLE_EDGE * 2))
}

/// Returns a copy of `value` with every credential key masked.
#[must_use]
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => {
            let mut output = Map::with_capacity(map.len());
            for (key, nested) in map {
                let masked = if SENSITIVE_KEYS.contains(&key.as_str()) {
                    Value::String(REDACTED.to_string())
                } else if PARTIAL_REDACT_KEYS.contains(&key.as_str()) {
                    match nested {
                        Value::String(text) => Value::String(partially_redact(text)),
                        _ => Value::String(REDACTED.to_string()),
                    }
                } else {
                    redact_value(nested)
                };
                output.insert(key.clone(), masked);
            }
            Value::Object(output)
        }
        other => other.clone(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
