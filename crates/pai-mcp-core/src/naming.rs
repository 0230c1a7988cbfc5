// crates/pai-mcp-core/src/naming.rs
// ============================================================================
// Module: Job Naming and Ownership
// Description: Display-name generation and ownership checks.
// Purpose: Scope every job operation to this installation's prefix and user.
// Dependencies: thiserror, time
// ============================================================================

//! ## Overview
//! Jobs created here are named `{prefix}-{name}-{YYYYMMDDHHMMSS}` using the
//! local clock. The prefix is the only link between a remote job and this
//! installation, so stop/wait calls refuse jobs outside it.
//! Security posture: ownership checks are a trust boundary; fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;

use crate::job::JobSummary;

// ============================================================================
// SECTION: Display Names
// ============================================================================

/// Returns the current local time, falling back to UTC when the offset is unknown.
#[must_use]
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Formats a timestamp as `YYYYMMDDHHMMSS`.
#[must_use]
pub fn compact_timestamp(at: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// Builds `{prefix}-{name}-{timestamp}`.
#[must_use]
pub fn generate_display_name(project_prefix: &str, name: &str, at: OffsetDateTime) -> String {
    format!("{project_prefix}-{name}-{}", compact_timestamp(at))
}

/// Returns the prefix every owned display name starts with.
#[must_use]
pub fn owned_prefix(project_prefix: &str) -> String {
    format!("{project_prefix}-")
}

// ============================================================================
// SECTION: Ownership
// ============================================================================

/// Checks that a job belongs to this installation and, when known, this user.
///
/// # Errors
///
/// Returns [`OwnershipError`] when the display name lacks the prefix or the
/// user ids disagree.
pub fn validate_job_ownership(
    job: &JobSummary,
    project_prefix: &str,
    caller_user_id: Option<&str>,
) -> Result<(), OwnershipError> {
    let expected = owned_prefix(project_prefix);
    if !job.display_name.starts_with(&expected) {
        return Err(OwnershipError::OwnershipMismatch(format!(
            "Job displayName must start with '{expected}'."
        )));
    }
    validate_job_user(job, caller_user_id)
}

/// Checks only the user id half of ownership.
///
/// # Errors
///
/// Returns [`OwnershipError`] when both user ids are known and differ.
pub fn validate_job_user(
    job: &JobSummary,
    caller_user_id: Option<&str>,
) -> Result<(), OwnershipError> {
    match (job.user_id.as_deref(), caller_user_id) {
        (Some(owner), Some(caller)) if !owner.is_empty() && !caller.is_empty() && owner != caller => {
            Err(OwnershipError::OwnershipMismatch(format!(
                "Job userId '{owner}' does not match current user '{caller}'."
            )))
        }
        _ => Ok(()),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ownership check failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    /// Job belongs to another installation or user.
    #[error("{0}")]
    OwnershipMismatch(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
