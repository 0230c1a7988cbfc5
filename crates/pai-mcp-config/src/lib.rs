// crates/pai-mcp-config/src/lib.rs
// ============================================================================
// Module: PAI MCP Config Library
// Description: Settings model, path addressing, persistence, and the store.
// Purpose: Single owner of the persisted settings document.
// Dependencies: pai-mcp-core, serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! `pai-mcp-config` loads the settings document once, hands it to a
//! [`ConfigStore`], and from then on every change flows through the store's
//! serialized mutation path: locked-field policy, full re-validation, atomic
//! write, snapshot swap.
//!
//! Security posture: settings inputs are untrusted and carry credentials;
//! locked fields are immutable outside re-initialization.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod load;
pub mod path;
pub mod persist;
pub mod schema;
pub mod settings;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use load::*;
pub use path::FieldPath;
pub use path::PathError;
pub use path::PathSegment;
pub use persist::PersistError;
pub use persist::write_settings;
pub use schema::field_catalog;
pub use schema::settings_schema;
pub use settings::*;
pub use store::*;
