// crates/pai-mcp-dlc/src/wire.rs
// ============================================================================
// Module: Wire Key Casing
// Description: Recursive camelCase/PascalCase key conversion for API bodies.
// Purpose: Bridge the settings vocabulary and the service's PascalCase JSON.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The service speaks PascalCase (`ResourceConfig`, `PodCount`) while
//! settings and tool results use camelCase. Acronym keys such as `GPU` and
//! `CPU` are preserved in both directions: a key is lower-cased on the way in
//! only when its second character is already lowercase.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Conversion
// ============================================================================

/// Recursively rewrites object keys to PascalCase.
#[must_use]
pub fn to_pascal_keys(value: Value) -> Value {
    convert_keys(value, pascal_key)
}

/// Recursively rewrites object keys to camelCase, preserving acronyms.
#[must_use]
pub fn to_camel_keys(value: Value) -> Value {
    convert_keys(value, camel_key)
}

/// Applies `rename` to every object key below `value`.
fn convert_keys(value: Value, rename: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, child)| (rename(&key), convert_keys(child, rename)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|item| convert_keys(item, rename)).collect())
        }
        other => other,
    }
}

/// Upper-cases the first character.
fn pascal_key(key: &str) -> String {
    let mut chars = key.chars();
    chars.next().map_or_else(String::new, |first| first.to_uppercase().chain(chars).collect())
}

/// Lower-cases the first character unless the key starts with an acronym.
fn camel_key(key: &str) -> String {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let second_is_upper = key.chars().nth(1).is_some_and(char::is_uppercase);
    if second_is_upper {
        return key.to_string();
    }
    first.to_lowercase().chain(chars).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
