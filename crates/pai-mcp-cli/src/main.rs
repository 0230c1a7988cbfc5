// crates/pai-mcp-cli/src/main.rs
// ============================================================================
// Module: PAI MCP CLI Entry Point
// Description: Command dispatcher for the MCP server and operator diagnostics.
// Purpose: Start the stdio server and inspect settings and remote jobs safely.
// Dependencies: clap, pai-mcp, pai-mcp-config, pai-mcp-core, pai-mcp-dlc, tokio.
// ============================================================================

//! ## Overview
//! The `pai-mcp` binary serves MCP over stdio and offers a handful of
//! offline and read-only diagnostics: `doctor`, `dump-job-specs`, and the
//! `config` helpers. Security posture: stdout belongs to the JSON-RPC
//! transport while serving, so `serve` only ever writes diagnostics to
//! stderr, and credentials are printed masked.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use pai_mcp::DEFAULT_MAX_BODY_BYTES;
use pai_mcp::McpAuditSink;
use pai_mcp::McpFileAuditSink;
use pai_mcp::McpNoopAuditSink;
use pai_mcp::McpServer;
use pai_mcp::McpStderrAuditSink;
use pai_mcp::ToolRouter;
use pai_mcp::ToolRouterConfig;
use pai_mcp_config::ConfigStore;
use pai_mcp_config::Settings;
use pai_mcp_config::load_settings;
use pai_mcp_config::resolve_settings_path;
use pai_mcp_config::settings_schema;
use pai_mcp_core::IdentityResolver;
use pai_mcp_core::JobDetail;
use pai_mcp_core::JobOrchestrator;
use pai_mcp_core::ListJobsFilter;
use pai_mcp_core::owned_prefix;
use pai_mcp_core::redact::partially_redact;
use pai_mcp_dlc::AcsCredentials;
use pai_mcp_dlc::DEFAULT_MAX_RESPONSE_BYTES;
use pai_mcp_dlc::DlcClient;
use pai_mcp_dlc::DlcClientConfig;
use pai_mcp_dlc::StsClient;
use pai_mcp_dlc::wire::to_camel_keys;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default outbound HTTP timeout in milliseconds.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Number of prefixed jobs the doctor lists.
const DOCTOR_JOB_LIMIT: usize = 5;

/// Page size requested by the doctor before prefix filtering.
const DOCTOR_PAGE_SIZE: u32 = 20;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "pai-mcp", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP server on stdio.
    Serve(ServeCommand),
    /// Check settings, credentials, and job service reachability.
    Doctor(DoctorCommand),
    /// Print a job's specs in a form that can be pasted into a profile.
    DumpJobSpecs(DumpJobSpecsCommand),
    /// Settings file utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Settings location shared by every command.
#[derive(Args, Debug, Clone, Default)]
struct SettingsArgs {
    /// Settings file path (defaults to `ALIYUN_PAI_SETTINGS_PATH` or
    /// `~/.config/aliyun-pai/settings.json`).
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,
}

/// Remote client knobs shared by commands that reach the cloud APIs.
#[derive(Args, Debug, Clone)]
struct RemoteArgs {
    /// Outbound HTTP timeout in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    request_timeout_ms: u64,
    /// Base URL replacing the regional job service endpoint.
    #[arg(long, value_name = "URL")]
    endpoint_override: Option<Url>,
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Settings location.
    #[command(flatten)]
    settings: SettingsArgs,
    /// Remote client knobs.
    #[command(flatten)]
    remote: RemoteArgs,
    /// Append audit events to this file instead of stderr.
    #[arg(long, value_name = "PATH", conflicts_with = "no_audit")]
    audit_log: Option<PathBuf>,
    /// Disable audit events.
    #[arg(long, action = ArgAction::SetTrue)]
    no_audit: bool,
    /// Maximum JSON-RPC frame size in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
}

/// Configuration for the `doctor` command.
#[derive(Args, Debug)]
struct DoctorCommand {
    /// Settings location.
    #[command(flatten)]
    settings: SettingsArgs,
    /// Remote client knobs.
    #[command(flatten)]
    remote: RemoteArgs,
}

/// Configuration for the `dump-job-specs` command.
#[derive(Args, Debug)]
struct DumpJobSpecsCommand {
    /// Job id to inspect.
    #[arg(value_name = "JOB_ID")]
    job_id: String,
    /// Settings location.
    #[command(flatten)]
    settings: SettingsArgs,
    /// Remote client knobs.
    #[command(flatten)]
    remote: RemoteArgs,
}

/// Settings file subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the settings file.
    Validate(SettingsArgs),
    /// Print the settings JSON Schema.
    Schema,
    /// Print the resolved settings path.
    Path(SettingsArgs),
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Doctor(command) => command_doctor(command).await,
        Commands::DumpJobSpecs(command) => command_dump_job_specs(command).await,
        Commands::Config {
            command,
        } => command_config(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let path = resolve_settings_path(command.settings.settings.as_deref())
        .map_err(|err| CliError::new(format!("failed to resolve settings path: {err}")))?;
    let store = ConfigStore::open(&path)
        .map_err(|err| CliError::new(format!("failed to load settings: {err}")))?;
    let settings = store.snapshot();
    let (dlc, sts) = build_clients(&settings, &command.remote)?;

    let identity = sts
        .resolve_caller_identity()
        .await
        .map_err(|err| CliError::new(format!("failed to resolve caller identity: {err}")))?;
    let audit = audit_sink(command.no_audit, command.audit_log.as_deref())?;

    let router = ToolRouter::new(ToolRouterConfig {
        store: Arc::new(store),
        orchestrator: Arc::new(dlc),
        identity,
        audit: Arc::clone(&audit),
    });
    let server = McpServer::new(router, audit, command.max_body_bytes);
    server.serve_stdio().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Selects the audit sink from the `serve` flags.
fn audit_sink(no_audit: bool, audit_log: Option<&Path>) -> CliResult<Arc<dyn McpAuditSink>> {
    if no_audit {
        return Ok(Arc::new(McpNoopAuditSink));
    }
    match audit_log {
        Some(path) => {
            let sink = McpFileAuditSink::new(path).map_err(|err| {
                CliError::new(format!("failed to open audit log {}: {err}", path.display()))
            })?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(McpStderrAuditSink)),
    }
}

/// Builds the job service and identity clients from stored credentials.
fn build_clients(settings: &Settings, remote: &RemoteArgs) -> CliResult<(DlcClient, StsClient)> {
    let credentials = AcsCredentials {
        access_key_id: settings.credentials.access_key_id.clone(),
        access_key_secret: settings.credentials.access_key_secret.clone(),
        security_token: settings.credentials.security_token.clone(),
    };
    let timeout = Duration::from_millis(remote.request_timeout_ms);
    let dlc = DlcClient::new(DlcClientConfig {
        region_id: settings.region_id.clone(),
        credentials: credentials.clone(),
        endpoint_override: remote.endpoint_override.clone(),
        timeout,
        max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
    })
    .map_err(|err| CliError::new(format!("failed to build job service client: {err}")))?;
    let sts = StsClient::new(credentials, None, timeout, DEFAULT_MAX_RESPONSE_BYTES)
        .map_err(|err| CliError::new(format!("failed to build identity client: {err}")))?;
    Ok((dlc, sts))
}

// ============================================================================
// SECTION: Doctor Command
// ============================================================================

/// Pass/fail tally for the doctor checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DoctorReport {
    /// Checks that passed.
    passed: usize,
    /// Checks that failed.
    failed: usize,
}

impl DoctorReport {
    /// Records one check result and writes its line.
    fn record(
        &mut self,
        out: &mut dyn Write,
        check: &str,
        result: Result<String, String>,
    ) -> std::io::Result<()> {
        match result {
            Ok(detail) => {
                self.passed += 1;
                writeln!(out, "[PASS] {check}: {detail}")
            }
            Err(detail) => {
                self.failed += 1;
                writeln!(out, "[FAIL] {check}: {detail}")
            }
        }
    }

    /// Writes the closing summary line.
    fn finish(self, out: &mut dyn Write) -> std::io::Result<ExitCode> {
        let verdict = if self.failed == 0 { "passed" } else { "failed" };
        writeln!(
            out,
            "Doctor checks {verdict} ({} passed, {} failed)",
            self.passed, self.failed
        )?;
        Ok(if self.failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
    }
}

/// Executes the `doctor` command.
async fn command_doctor(command: DoctorCommand) -> CliResult<ExitCode> {
    let mut stdout = std::io::stdout();
    let mut report = DoctorReport::default();
    let loaded = load_settings(command.settings.settings.as_deref());
    let settings = match loaded {
        Ok((_, settings)) => settings,
        Err(err) => {
            report
                .record(&mut stdout, "settings", Err(err.to_string()))
                .map_err(|err| output_error("stdout", &err))?;
            return report.finish(&mut stdout).map_err(|err| output_error("stdout", &err));
        }
    };
    let (dlc, sts) = build_clients(&settings, &command.remote)?;
    run_doctor_checks(&settings, &sts, &dlc, &mut stdout, &mut report)
        .await
        .map_err(|err| output_error("stdout", &err))?;
    report.finish(&mut stdout).map_err(|err| output_error("stdout", &err))
}

/// Runs the settings, identity, and job listing checks.
async fn run_doctor_checks(
    settings: &Settings,
    identity: &dyn IdentityResolver,
    jobs: &dyn JobOrchestrator,
    out: &mut dyn Write,
    report: &mut DoctorReport,
) -> std::io::Result<()> {
    report.record(out, "settings", Ok(settings_summary(settings)))?;

    let resolved = identity
        .resolve_caller_identity()
        .await
        .map(|caller| {
            format!(
                "account={} user={} type={}",
                caller.account_id, caller.user_id, caller.identity_type
            )
        })
        .map_err(|err| err.to_string());
    report.record(out, "identity", resolved)?;

    let filter = ListJobsFilter::for_prefix(
        &settings.workspace_id,
        &settings.project_prefix,
        DOCTOR_PAGE_SIZE,
    );
    let prefix = owned_prefix(&settings.project_prefix);
    match jobs.list_jobs(&filter).await {
        Ok(listed) => {
            let owned: Vec<_> = listed
                .into_iter()
                .filter(|job| job.display_name.starts_with(&prefix))
                .take(DOCTOR_JOB_LIMIT)
                .collect();
            let detail = format!("{} recent job(s) under '{prefix}'", owned.len());
            report.record(out, "jobs", Ok(detail))?;
            for job in owned {
                writeln!(out, "  - {} ({}) {}", job.display_name, job.status, job.job_id)?;
            }
        }
        Err(err) => report.record(out, "jobs", Err(err.to_string()))?,
    }
    Ok(())
}

/// Renders the settings check line with the key masked.
fn settings_summary(settings: &Settings) -> String {
    let token = if settings.credentials.security_token.is_some() { "present" } else { "absent" };
    format!(
        "region={} workspace={} resource={} prefix={} accessKeyId={} stsToken={token}",
        settings.region_id,
        settings.workspace_id,
        settings.resource_id,
        settings.project_prefix,
        partially_redact(&settings.credentials.access_key_id),
    )
}

// ============================================================================
// SECTION: Dump Job Specs Command
// ============================================================================

/// Executes the `dump-job-specs` command.
async fn command_dump_job_specs(command: DumpJobSpecsCommand) -> CliResult<ExitCode> {
    let (_, settings) = load_settings(command.settings.settings.as_deref())
        .map_err(|err| CliError::new(format!("failed to load settings: {err}")))?;
    let (dlc, _) = build_clients(&settings, &command.remote)?;
    let detail = dlc
        .get_job(&command.job_id)
        .await
        .map_err(|err| CliError::new(format!("failed to fetch job {}: {err}", command.job_id)))?;
    let mut stdout = std::io::stdout();
    write_job_dump(&detail, &mut stdout).map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Returns the fields worth copying from an existing job.
fn selected_job_fields(detail: &JobDetail) -> Value {
    json!({
        "jobType": detail.summary.job_type,
        "jobSpecs": detail.summary.job_specs,
        "codeSource": detail.code_source,
        "dataSources": detail.data_sources,
        "resourceId": detail.resource_id,
        "workspaceId": detail.workspace_id,
    })
}

/// Returns the job specs with settings-style camelCase keys.
fn paste_ready_specs(detail: &JobDetail) -> Value {
    let specs = detail.summary.job_specs.iter().cloned().map(Value::Object).collect();
    to_camel_keys(Value::Array(specs))
}

/// Writes the selected fields followed by the paste-ready specs.
fn write_job_dump(detail: &JobDetail, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Job {} ({}):", detail.summary.job_id, detail.summary.display_name)?;
    writeln!(out, "{}", pretty(&selected_job_fields(detail)))?;
    writeln!(out)?;
    writeln!(out, "jobSpecs for a settings profile:")?;
    writeln!(out, "{}", pretty(&paste_ready_specs(detail)))
}

/// Pretty-prints JSON, falling back to the compact form.
fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches `config` subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(args) => {
            let (path, settings) = load_settings(args.settings.as_deref())
                .map_err(|err| CliError::new(format!("settings invalid: {err}")))?;
            write_stdout_line(&format!(
                "Settings valid: {} ({} profile(s))",
                path.display(),
                settings.profiles.len()
            ))
            .map_err(|err| output_error("stdout", &err))?;
        }
        ConfigCommand::Schema => {
            write_stdout_line(&pretty(&settings_schema()))
                .map_err(|err| output_error("stdout", &err))?;
        }
        ConfigCommand::Path(args) => {
            let path = resolve_settings_path(args.settings.as_deref())
                .map_err(|err| CliError::new(format!("failed to resolve settings path: {err}")))?;
            write_stdout_line(&path.display().to_string())
                .map_err(|err| output_error("stdout", &err))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Wraps an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write to {stream}: {error}"))
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
