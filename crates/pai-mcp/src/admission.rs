// crates/pai-mcp/src/admission.rs
// ============================================================================
// Module: Admission Controller
// Description: Concurrency and GPU/CPU ceilings for new job submissions.
// Purpose: Decide whether a submission may launch and build its request.
// Dependencies: pai-mcp-core, pai-mcp-config, serde, thiserror, time
// ============================================================================

//! ## Overview
//! A submission resolves its profile, sums the GPU/CPU it asks for, lists the
//! installation's active jobs, and passes three gates in order: the hard
//! `maxRunningJobs` ceiling, then `maxGPU`, then `maxCPU`. A failed gate is a
//! [`CapacityRejection`] value, not an error, and nothing is created.
//!
//! The check-then-act sequence is not transactional against the remote
//! service. Two submissions racing through the same window can both pass the
//! gates before either job is listed, so the ceilings are best-effort under
//! concurrent callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use pai_mcp_config::DEFAULT_PROFILE;
use pai_mcp_config::Profile;
use pai_mcp_config::Settings;
use pai_mcp_core::CodeSourceRequest;
use pai_mcp_core::CreateJobRequest;
use pai_mcp_core::DataSourceRequest;
use pai_mcp_core::JobOrchestrator;
use pai_mcp_core::JobSummary;
use pai_mcp_core::ListJobsFilter;
use pai_mcp_core::OrchestratorError;
use pai_mcp_core::ResourceUsage;
use pai_mcp_core::generate_display_name;
use pai_mcp_core::owned_prefix;
use pai_mcp_core::summarize_specs;
use pai_mcp_core::total_usage;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Page size used when listing jobs for admission.
pub const ADMISSION_PAGE_SIZE: u32 = 100;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Caller-supplied submission parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Short task name embedded in the display name.
    pub name: String,
    /// Command executed in the containers.
    pub command: String,
    /// Profile to resolve; `default` when the caller names none.
    pub profile: String,
    /// Branch override for the code source.
    pub code_branch: Option<String>,
    /// Commit override for the code source.
    pub code_commit: Option<String>,
}

/// Active job counted against the ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveJob {
    /// Job display name.
    pub display_name: String,
    /// Job status.
    pub status: String,
}

/// Reason a submission was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityRejection {
    /// Active job count already at `maxRunningJobs`.
    RunningJobs {
        /// Configured ceiling.
        limit: u64,
        /// Active jobs at decision time.
        active: Vec<ActiveJob>,
    },
    /// Projected GPU total above `maxGPU`.
    Gpu {
        /// Configured ceiling.
        limit: u64,
        /// GPUs held by active jobs.
        current: u64,
        /// GPUs requested.
        requested: u64,
        /// `current + requested`.
        projected: u64,
    },
    /// Projected CPU total above `maxCPU`.
    Cpu {
        /// Configured ceiling.
        limit: u64,
        /// Cores held by active jobs.
        current: u64,
        /// Cores requested.
        requested: u64,
        /// `current + requested`.
        projected: u64,
    },
}

impl CapacityRejection {
    /// Returns a stable label for the gate that fired.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RunningJobs {
                ..
            } => "max_running_jobs",
            Self::Gpu {
                ..
            } => "max_gpu",
            Self::Cpu {
                ..
            } => "max_cpu",
        }
    }
}

impl fmt::Display for CapacityRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunningJobs {
                limit,
                active,
            } => {
                write!(
                    f,
                    "Limit exceeded: maxRunningJobs ({limit}). Current active jobs: {}.",
                    active.len()
                )?;
                if !active.is_empty() {
                    f.write_str("\nActive jobs:")?;
                    for job in active {
                        write!(f, "\n  - {} ({})", job.display_name, job.status)?;
                    }
                }
                Ok(())
            }
            Self::Gpu {
                limit,
                current,
                requested,
                projected,
            } => write!(
                f,
                "Limit exceeded: maxGPU ({limit}). Current usage: {current}, requested: \
                 {requested}, projected: {projected}."
            ),
            Self::Cpu {
                limit,
                current,
                requested,
                projected,
            } => write!(
                f,
                "Limit exceeded: maxCPU ({limit}). Current usage: {current}, requested: \
                 {requested}, projected: {projected}."
            ),
        }
    }
}

/// Gate evaluation for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionDecision {
    /// Active jobs carrying this installation's prefix.
    pub active_jobs: Vec<ActiveJob>,
    /// Usage held by the active jobs.
    pub current: ResourceUsage,
    /// Usage the submission asks for.
    pub requested: ResourceUsage,
    /// `current + requested`.
    pub projected: ResourceUsage,
    /// First gate that refused the submission.
    pub rejection: Option<CapacityRejection>,
}

/// What the submitted job was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    /// Resolved profile name.
    pub profile: String,
    /// Framework type.
    pub job_type: String,
    /// Image of the first job spec.
    pub image: Option<String>,
    /// One resource line per job spec.
    pub resources: Vec<String>,
    /// Container command.
    pub command: String,
    /// Branch checked out, when a code source is configured.
    pub code_branch: Option<String>,
    /// Mounts as `ds-<i>:<mountPath>(<access>)`.
    pub mounts: Vec<String>,
}

/// Created job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    /// Remote job id.
    pub job_id: String,
    /// Generated display name.
    pub display_name: String,
    /// Submission summary.
    pub submitted: SubmissionSummary,
}

/// Result of a submission attempt that reached the gates.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionOutcome {
    /// Job created.
    Submitted {
        /// Gate evaluation that admitted the job.
        decision: AdmissionDecision,
        /// Created job.
        job: SubmittedJob,
    },
    /// A gate refused the submission; nothing was created.
    Rejected(AdmissionDecision),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Admission failures that are not capacity rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// Resolved profile cannot produce a job.
    #[error("{0}")]
    ConfigurationIncomplete(String),
    /// Requested profile does not exist.
    #[error("profile \"{0}\" does not exist")]
    ProfileNotFound(String),
    /// Remote service failure.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    /// Create call returned no job id.
    #[error("job creation succeeded but no job id was returned")]
    MissingJobId,
}

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Gates submissions against live job state.
#[derive(Clone)]
pub struct AdmissionController {
    /// Remote job service.
    orchestrator: Arc<dyn JobOrchestrator>,
}

impl AdmissionController {
    /// Creates a controller over `orchestrator`.
    #[must_use]
    pub fn new(orchestrator: Arc<dyn JobOrchestrator>) -> Self {
        Self {
            orchestrator,
        }
    }

    /// Evaluates the gates for `profile` without creating anything.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::ConfigurationIncomplete`] when the profile
    /// has no job specs, or [`AdmissionError::Orchestrator`] when listing
    /// fails.
    pub async fn evaluate(
        &self,
        settings: &Settings,
        profile: &Profile,
    ) -> Result<AdmissionDecision, AdmissionError> {
        if profile.job_specs.is_empty() {
            return Err(AdmissionError::ConfigurationIncomplete(
                "jobSpecs is empty: configure via pai_config_update or profiles.".to_string(),
            ));
        }
        let requested = total_usage(&profile.job_specs);
        let active = self.active_jobs(settings).await?;
        let current = active
            .iter()
            .map(|job| total_usage(&job.job_specs))
            .fold(ResourceUsage::default(), ResourceUsage::saturating_add);
        let projected = current.saturating_add(requested);
        let active_jobs: Vec<ActiveJob> = active
            .into_iter()
            .map(|job| ActiveJob {
                display_name: job.display_name,
                status: job.status,
            })
            .collect();
        let limits = settings.limits.unwrap_or_default();
        let max_running = settings.max_running_jobs();
        let active_count = u64::try_from(active_jobs.len()).unwrap_or(u64::MAX);
        let rejection = if active_count >= max_running {
            Some(CapacityRejection::RunningJobs {
                limit: max_running,
                active: active_jobs.clone(),
            })
        } else if let Some(limit) = limits.max_gpu
            && projected.gpu > limit
        {
            Some(CapacityRejection::Gpu {
                limit,
                current: current.gpu,
                requested: requested.gpu,
                projected: projected.gpu,
            })
        } else if let Some(limit) = limits.max_cpu
            && projected.cpu > limit
        {
            Some(CapacityRejection::Cpu {
                limit,
                current: current.cpu,
                requested: requested.cpu,
                projected: projected.cpu,
            })
        } else {
            None
        };
        Ok(AdmissionDecision {
            active_jobs,
            current,
            requested,
            projected,
            rejection,
        })
    }

    /// Runs the gates and, when they pass, creates the job.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] when the profile is missing or empty, or
    /// the remote service fails.
    pub async fn submit(
        &self,
        settings: &Settings,
        request: &SubmitRequest,
        now: OffsetDateTime,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        let profile_name =
            if request.profile.is_empty() { DEFAULT_PROFILE } else { request.profile.as_str() };
        let profile = settings
            .profiles
            .get(profile_name)
            .ok_or_else(|| AdmissionError::ProfileNotFound(profile_name.to_string()))?;
        let decision = self.evaluate(settings, profile).await?;
        if decision.rejection.is_some() {
            return Ok(AdmissionOutcome::Rejected(decision));
        }

        let display_name = generate_display_name(&settings.project_prefix, &request.name, now);
        let code_source = settings.code_source.as_ref().map(|source| CodeSourceRequest {
            code_source_id: source.code_source_id.clone(),
            branch: request.code_branch.clone().or_else(|| Some(source.default_branch.clone())),
            commit: request.code_commit.clone().or_else(|| source.default_commit.clone()),
            mount_path: source.mount_path.clone(),
        });
        let data_sources: Vec<DataSourceRequest> = settings
            .mounts
            .iter()
            .map(|mount| DataSourceRequest {
                uri: mount.uri.clone(),
                mount_path: mount.mount_path.clone(),
                mount_access: mount.mount_access.api_value().to_string(),
                options: mount.options.clone(),
            })
            .collect();
        let create = CreateJobRequest {
            workspace_id: settings.workspace_id.clone(),
            resource_id: settings.resource_id.clone(),
            display_name: display_name.clone(),
            job_type: profile.job_type.clone(),
            job_specs: profile.job_specs.clone(),
            user_command: request.command.clone(),
            code_source: code_source.clone(),
            data_sources,
        };
        let job_id = self.orchestrator.create_job(&create).await?;
        if job_id.is_empty() {
            return Err(AdmissionError::MissingJobId);
        }

        let submitted = SubmissionSummary {
            profile: profile_name.to_string(),
            job_type: profile.job_type.clone(),
            image: profile
                .job_specs
                .first()
                .and_then(|spec| spec.get("image"))
                .and_then(Value::as_str)
                .map(str::to_string),
            resources: summarize_specs(&profile.job_specs),
            command: request.command.clone(),
            code_branch: code_source.and_then(|source| source.branch),
            mounts: settings
                .mounts
                .iter()
                .enumerate()
                .map(|(index, mount)| {
                    format!("ds-{index}:{}({})", mount.mount_path, mount.mount_access.api_value())
                })
                .collect(),
        };
        Ok(AdmissionOutcome::Submitted {
            decision,
            job: SubmittedJob {
                job_id,
                display_name,
                submitted,
            },
        })
    }

    /// Lists active jobs whose display name carries the installation prefix.
    async fn active_jobs(&self, settings: &Settings) -> Result<Vec<JobSummary>, AdmissionError> {
        let filter = ListJobsFilter::for_prefix(
            &settings.workspace_id,
            &settings.project_prefix,
            ADMISSION_PAGE_SIZE,
        );
        let prefix = owned_prefix(&settings.project_prefix);
        let jobs = self.orchestrator.list_jobs(&filter).await?;
        Ok(jobs
            .into_iter()
            .filter(|job| job.display_name.starts_with(&prefix) && job.is_active())
            .collect())
    }
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

    use super::ActiveJob;
    use super::CapacityRejection;

    #[test]
    fn running_jobs_message_lists_each_active_job() {
        let rejection = CapacityRejection::RunningJobs {
            limit: 1,
            active: vec![ActiveJob {
                display_name: "alice-train-20260101120000".to_string(),
                status: "Running".to_string(),
            }],
        };
        assert_eq!(
            rejection.to_string(),
            "Limit exceeded: maxRunningJobs (1). Current active jobs: 1.\nActive jobs:\n  - \
             alice-train-20260101120000 (Running)"
        );
        assert_eq!(rejection.kind(), "max_running_jobs");
    }

    #[test]
    fn quota_messages_report_all_three_numbers() {
        let gpu = CapacityRejection::Gpu {
            limit: 8,
            current: 4,
            requested: 8,
            projected: 12,
        };
        assert_eq!(
            gpu.to_string(),
            "Limit exceeded: maxGPU (8). Current usage: 4, requested: 8, projected: 12."
        );
        let cpu = CapacityRejection::Cpu {
            limit: 16,
            current: 12,
            requested: 8,
            projected: 20,
        };
        assert!(cpu.to_string().starts_with("Limit exceeded: maxCPU (16)."));
    }
}
