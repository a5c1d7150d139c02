// crates/kfutil-cli/src/main.rs
// ============================================================================
// Module: kfutil CLI Entry Point
// Description: Command dispatcher for root-of-trust and bulk store workflows.
// Purpose: Parse arguments, build the Platform client, and map exit codes.
// Dependencies: clap, kfutil-config, kfutil-core, kfutil-gateway, thiserror
// ============================================================================

//! ## Overview
//! `kfutil rot` audits and reconciles root-of-trust stores; `kfutil stores`
//! creates and exports stores in bulk. Artifacts are CSV files; summaries go
//! to stdout, and per-row errors and diagnostics go to stderr.
//!
//! Exit codes: `0` on success, `1` when any row or action failed, `2` on
//! invalid input or configuration.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use kfutil_cli::logging;
use kfutil_cli::prompt::TerminalPrompt;
use kfutil_cli::t;
use kfutil_config::AuthConfig;
use kfutil_config::load_profile;
use kfutil_core::Clock;
use kfutil_core::ErrorKind;
use kfutil_core::ErrorList;
use kfutil_core::ImportOptions;
use kfutil_core::NoPrompt;
use kfutil_core::ReconcileSource;
use kfutil_core::RotError;
use kfutil_core::RotManager;
use kfutil_core::RunConfig;
use kfutil_core::SecretPrompt;
use kfutil_core::SecretValues;
use kfutil_core::StoreTypeRef;
use kfutil_core::SystemClock;
use kfutil_core::TemplateFilters;
use kfutil_core::TemplateFormat;
use kfutil_core::TemplateKind;
use kfutil_core::Thresholds;
use kfutil_core::runtime::bulk::bulk_template;
use kfutil_core::runtime::bulk::export_stores;
use kfutil_core::runtime::bulk::import_stores;
use kfutil_core::runtime::bulk::results_path_for;
use kfutil_core::runtime::eligibility::DISABLED;
use kfutil_core::runtime::manager::DEFAULT_AUDIT_PATH;
use kfutil_core::runtime::templates::build_rot_template;
use kfutil_core::runtime::templates::header_template;
use kfutil_gateway::HttpPlatform;
use kfutil_gateway::HttpPlatformConfig;
use kfutil_gateway::PlatformAuth;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "kfutil", version, disable_help_subcommand = true)]
struct Cli {
    /// Path to kfutil.toml (overrides `KFUTIL_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Connection profile name.
    #[arg(long, value_name = "NAME", global = true)]
    profile: Option<String>,
    /// Log filter directive (overrides `KFUTIL_LOG`).
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Root-of-trust audit and reconciliation.
    Rot {
        /// Selected root-of-trust subcommand.
        #[command(subcommand)]
        command: RotCommand,
    },
    /// Bulk certificate store utilities.
    Stores {
        /// Selected stores subcommand.
        #[command(subcommand)]
        command: StoresCommand,
    },
}

/// Root-of-trust subcommands.
#[derive(Subcommand, Debug)]
enum RotCommand {
    /// Plan changes and write the audit CSV.
    Audit(RotAuditCommand),
    /// Apply a fresh or previously written plan.
    Reconcile(RotReconcileCommand),
    /// Write an input template.
    GenerateTemplate(RotTemplateCommand),
}

/// Eligibility threshold flags.
#[derive(Args, Debug, Clone, Copy)]
struct ThresholdArgs {
    /// Minimum certificates a store must hold; -1 disables the check.
    #[arg(long, value_name = "N", default_value_t = DISABLED, allow_negative_numbers = true)]
    min_certs: i64,
    /// Maximum leaf certificates a store may hold; -1 disables the check.
    #[arg(long = "max-leaf-certs", value_name = "N", default_value_t = DISABLED, allow_negative_numbers = true)]
    max_leaves: i64,
    /// Maximum private keys a store may hold; -1 disables the check.
    #[arg(long, value_name = "N", default_value_t = DISABLED, allow_negative_numbers = true)]
    max_keys: i64,
}

impl From<ThresholdArgs> for Thresholds {
    fn from(args: ThresholdArgs) -> Self {
        Self {
            min_certs: args.min_certs,
            max_leaves: args.max_leaves,
            max_keys: args.max_keys,
        }
    }
}

/// Arguments for `rot audit`.
#[derive(Args, Debug)]
struct RotAuditCommand {
    /// Stores CSV.
    #[arg(long, value_name = "FILE")]
    stores: PathBuf,
    /// Certificates to add.
    #[arg(long, value_name = "FILE")]
    add_certs: Option<PathBuf>,
    /// Certificates to remove.
    #[arg(long, value_name = "FILE")]
    remove_certs: Option<PathBuf>,
    /// Eligibility thresholds.
    #[command(flatten)]
    thresholds: ThresholdArgs,
    /// Audit CSV path.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_AUDIT_PATH)]
    outpath: PathBuf,
    /// Accepted for symmetry with `reconcile`; audit never dispatches changes.
    #[arg(long)]
    dry_run: bool,
}

/// Arguments for `rot reconcile`.
#[derive(Args, Debug)]
struct RotReconcileCommand {
    /// Stores CSV.
    #[arg(long, value_name = "FILE", required_unless_present = "import_csv")]
    stores: Option<PathBuf>,
    /// Certificates to add.
    #[arg(long, value_name = "FILE")]
    add_certs: Option<PathBuf>,
    /// Certificates to remove.
    #[arg(long, value_name = "FILE")]
    remove_certs: Option<PathBuf>,
    /// Apply an existing audit CSV instead of planning.
    #[arg(long, conflicts_with_all = ["stores", "add_certs", "remove_certs"])]
    import_csv: bool,
    /// Audit CSV read by `--import-csv`.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_AUDIT_PATH, requires = "import_csv")]
    input_file: PathBuf,
    /// Eligibility thresholds.
    #[command(flatten)]
    thresholds: ThresholdArgs,
    /// Audit CSV path when planning; reconciled CSV path with `--import-csv`.
    #[arg(long, value_name = "FILE")]
    outpath: Option<PathBuf>,
    /// Describe actions without dispatching them.
    #[arg(long)]
    dry_run: bool,
}

/// Arguments for `rot generate-template`.
#[derive(Args, Debug)]
struct RotTemplateCommand {
    /// Template type: certs, stores, or actions.
    #[arg(long = "type", value_name = "TYPE")]
    kind: TemplateKind,
    /// Store types to pre-populate from, by name or id.
    #[arg(long = "store-type", value_name = "NAME|ID")]
    store_types: Vec<String>,
    /// Container name to pre-populate from.
    #[arg(long, value_name = "NAME")]
    container_name: Option<String>,
    /// Client machine to pre-populate from.
    #[arg(long, value_name = "NAME")]
    client_machine: Option<String>,
    /// Certificate collection to pre-populate from.
    #[arg(long, value_name = "ID")]
    collection: Option<i64>,
    /// Subject common names to pre-populate from.
    #[arg(long = "cn", value_name = "NAME")]
    common_names: Vec<String>,
    /// Output format: csv or json.
    #[arg(long, value_name = "FORMAT", default_value = "csv")]
    format: TemplateFormat,
    /// Output path; defaults to `<type>_template.<format>`.
    #[arg(long, value_name = "FILE")]
    outpath: Option<PathBuf>,
}

/// Bulk store subcommands.
#[derive(Subcommand, Debug)]
enum StoresCommand {
    /// Bulk store creation.
    Import {
        /// Selected import subcommand.
        #[command(subcommand)]
        command: StoresImportCommand,
    },
    /// Export every store of a type to a bulk CSV.
    Export(StoresExportCommand),
}

/// Bulk import subcommands.
#[derive(Subcommand, Debug)]
enum StoresImportCommand {
    /// Write the bulk CSV header for a store type.
    GenerateTemplate(StoresTemplateCommand),
    /// Create one store per CSV row.
    Csv(StoresImportCsvCommand),
}

/// Arguments for `stores import generate-template`.
#[derive(Args, Debug)]
struct StoresTemplateCommand {
    /// Store type, by name or id.
    #[arg(long = "store-type", value_name = "NAME|ID")]
    store_type: String,
    /// Output path; defaults to `<short-name>_stores_template.csv`.
    #[arg(long, value_name = "FILE")]
    outpath: Option<PathBuf>,
}

/// Arguments for `stores import csv`.
#[derive(Args, Debug)]
struct StoresImportCsvCommand {
    /// Bulk CSV to import.
    #[arg(long, value_name = "FILE")]
    file: PathBuf,
    /// Store type, by name or id.
    #[arg(long = "store-type", value_name = "NAME|ID")]
    store_type: String,
    /// Default server username.
    #[arg(long, value_name = "VALUE")]
    server_username: Option<String>,
    /// Default server password.
    #[arg(long, value_name = "VALUE")]
    server_password: Option<String>,
    /// Default store password.
    #[arg(long, value_name = "VALUE")]
    store_password: Option<String>,
    /// Never prompt; missing required secrets fail the row.
    #[arg(long)]
    no_prompt: bool,
    /// Results CSV path; defaults to `<file>_results.csv`.
    #[arg(long, value_name = "FILE")]
    results_path: Option<PathBuf>,
}

/// Arguments for `stores export`.
#[derive(Args, Debug)]
struct StoresExportCommand {
    /// Store type, by name or id.
    #[arg(long = "store-type", value_name = "NAME|ID")]
    store_type: String,
    /// Output path; defaults to `<short-name>_stores_export.csv`.
    #[arg(long, value_name = "FILE")]
    outpath: Option<PathBuf>,
}

/// Connection selection shared by every command.
struct Connection {
    /// Config file override.
    config: Option<PathBuf>,
    /// Profile name.
    profile: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a message and its exit code.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
    /// Process exit code.
    code: u8,
}

impl CliError {
    /// Constructs an invalid-input error (exit code 2).
    const fn input(message: String) -> Self {
        Self {
            message,
            code: 2,
        }
    }

    /// Constructs a run failure (exit code 1).
    const fn failure(message: String) -> Self {
        Self {
            message,
            code: 1,
        }
    }
}

impl From<RotError> for CliError {
    fn from(err: RotError) -> Self {
        let message = t!("run.failed", error = err);
        if err.kind == ErrorKind::Input { Self::input(message) } else { Self::failure(message) }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err),
    }
}

/// Parses arguments and dispatches the selected command.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let env_level = env::var(logging::LOG_ENV).ok();
    logging::init(cli.log_level.as_deref(), env_level.as_deref());
    let connection = Connection {
        config: cli.config,
        profile: cli.profile,
    };
    match cli.command {
        Commands::Rot {
            command,
        } => match command {
            RotCommand::Audit(command) => command_rot_audit(&connection, command),
            RotCommand::Reconcile(command) => command_rot_reconcile(&connection, command),
            RotCommand::GenerateTemplate(command) => command_rot_template(&connection, command),
        },
        Commands::Stores {
            command,
        } => match command {
            StoresCommand::Import {
                command: StoresImportCommand::GenerateTemplate(command),
            } => command_stores_template(&connection, &command),
            StoresCommand::Import {
                command: StoresImportCommand::Csv(command),
            } => command_stores_import(&connection, command),
            StoresCommand::Export(command) => command_stores_export(&connection, &command),
        },
    }
}

// ============================================================================
// SECTION: Root-of-Trust Commands
// ============================================================================

/// Executes `rot audit`.
fn command_rot_audit(connection: &Connection, command: RotAuditCommand) -> CliResult<ExitCode> {
    if command.dry_run {
        write_stderr_line(&t!("rot.audit.dry_run_ignored"))?;
    }
    let platform = connect(connection)?;
    let config = RunConfig {
        stores_path: Some(command.stores),
        add_certs_path: command.add_certs,
        remove_certs_path: command.remove_certs,
        audit_path: command.outpath,
        thresholds: command.thresholds.into(),
        ..RunConfig::default()
    };
    let report = RotManager::new(config, &platform).audit()?;
    report_errors(&report.errors)?;
    write_stdout_line(&t!(
        "rot.audit.summary",
        rows = report.plan.len(),
        adds = report.plan.add_count(),
        removes = report.plan.remove_count(),
        stores = report.eligible.len(),
        rejected = report.rejected.len(),
        path = report.audit_path.display()
    ))?;
    Ok(ExitCode::from(report.errors.exit_code()))
}

/// Executes `rot reconcile`.
fn command_rot_reconcile(
    connection: &Connection,
    command: RotReconcileCommand,
) -> CliResult<ExitCode> {
    let platform = connect(connection)?;
    let mut config = RunConfig {
        stores_path: command.stores,
        add_certs_path: command.add_certs,
        remove_certs_path: command.remove_certs,
        thresholds: command.thresholds.into(),
        dry_run: command.dry_run,
        ..RunConfig::default()
    };
    let source = if command.import_csv {
        config.reconciled_path = command.outpath;
        ReconcileSource::FromFile(command.input_file)
    } else {
        if let Some(outpath) = command.outpath {
            config.audit_path = outpath;
        }
        ReconcileSource::FromPlan
    };
    let manager = RotManager::new(config, &platform);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let report = manager.reconcile(&source, &mut out)?;
    drop(out);
    report_errors(&report.errors)?;

    let audit_path = match &source {
        ReconcileSource::FromFile(path) => path.display().to_string(),
        ReconcileSource::FromPlan => manager.config().audit_path.display().to_string(),
    };
    let reconciled = report
        .reconciled_path
        .as_ref()
        .map_or_else(|| t!("rot.reconcile.not_written"), |path| path.display().to_string());
    write_stdout_line(&t!(
        "rot.reconcile.summary",
        adds = report.outcome.adds,
        removes = report.outcome.removes,
        noops = report.outcome.noops,
        failures = report.outcome.failures,
        audit = audit_path,
        reconciled = reconciled
    ))?;
    Ok(ExitCode::from(report.errors.exit_code()))
}

/// Executes `rot generate-template`.
fn command_rot_template(
    connection: &Connection,
    command: RotTemplateCommand,
) -> CliResult<ExitCode> {
    let mut store_types = Vec::with_capacity(command.store_types.len());
    for value in &command.store_types {
        let parsed = StoreTypeRef::parse(value).map_err(|err| {
            CliError::input(t!("rot.template.invalid_store_type", value = value, error = err))
        })?;
        store_types.push(parsed);
    }
    let filters = TemplateFilters {
        store_types,
        container_name: command.container_name,
        client_machine: command.client_machine,
        collection_id: command.collection,
        common_names: command.common_names,
    };
    let path = command.outpath.unwrap_or_else(|| command.kind.default_path(command.format));
    let now = SystemClock.now();
    let (template, errors) = if needs_platform(command.kind, &filters) {
        let platform = connect(connection)?;
        build_rot_template(&platform, command.kind, &filters, now)
    } else {
        debug!(kind = %command.kind, "template needs no platform data");
        (header_template(command.kind), ErrorList::new())
    };
    template.write(&path, command.format)?;
    report_errors(&errors)?;
    write_stdout_line(&t!("template.written", path = path.display(), rows = template.rows.len()))?;
    Ok(ExitCode::from(errors.exit_code()))
}

/// Returns true when a template is pre-populated from the Platform.
fn needs_platform(kind: TemplateKind, filters: &TemplateFilters) -> bool {
    match kind {
        TemplateKind::Certs => filters.collection_id.is_some() || !filters.common_names.is_empty(),
        TemplateKind::Stores => {
            !filters.store_types.is_empty()
                || filters.container_name.is_some()
                || filters.client_machine.is_some()
        }
        TemplateKind::Actions => false,
    }
}

// ============================================================================
// SECTION: Bulk Store Commands
// ============================================================================

/// Executes `stores import generate-template`.
fn command_stores_template(
    connection: &Connection,
    command: &StoresTemplateCommand,
) -> CliResult<ExitCode> {
    let store_type = parse_store_type(&command.store_type)?;
    let platform = connect(connection)?;
    let (descriptor, template) = bulk_template(&platform, &store_type)?;
    let path = command
        .outpath
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}_stores_template.csv", descriptor.short_name)));
    template.write(&path, TemplateFormat::Csv)?;
    write_stdout_line(&t!("template.written", path = path.display(), rows = template.rows.len()))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `stores import csv`.
fn command_stores_import(
    connection: &Connection,
    command: StoresImportCsvCommand,
) -> CliResult<ExitCode> {
    let store_type = parse_store_type(&command.store_type)?;
    let platform = connect(connection)?;
    let options = ImportOptions {
        flags: SecretValues {
            server_username: command.server_username,
            server_password: command.server_password,
            store_password: command.store_password,
        },
        env: SecretValues::from_env(|name| env::var(name).ok()),
    };
    let results = command.results_path.unwrap_or_else(|| results_path_for(&command.file));
    let mut terminal;
    let mut declined = NoPrompt;
    let prompt: &mut dyn SecretPrompt = if command.no_prompt {
        &mut declined
    } else {
        terminal = TerminalPrompt::stdio();
        &mut terminal
    };
    let report = import_stores(&platform, &store_type, &command.file, &results, &options, prompt)?;
    report_errors(&report.errors)?;
    write_stdout_line(&t!(
        "stores.import.summary",
        created = report.created,
        failed = report.failed,
        path = report.results_path.display()
    ))?;
    Ok(ExitCode::from(report.errors.exit_code()))
}

/// Executes `stores export`.
fn command_stores_export(
    connection: &Connection,
    command: &StoresExportCommand,
) -> CliResult<ExitCode> {
    let store_type = parse_store_type(&command.store_type)?;
    let platform = connect(connection)?;
    let path = match &command.outpath {
        Some(path) => path.clone(),
        None => {
            let (descriptor, _) = bulk_template(&platform, &store_type)?;
            PathBuf::from(format!("{}_stores_export.csv", descriptor.short_name))
        }
    };
    let report = export_stores(&platform, &store_type, &path)?;
    report_errors(&report.errors)?;
    write_stdout_line(&t!("stores.export.summary", rows = report.rows, path = report.path.display()))?;
    Ok(ExitCode::from(report.errors.exit_code()))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads the connection profile and builds the HTTP Platform client.
fn connect(connection: &Connection) -> CliResult<HttpPlatform> {
    let profile = load_profile(connection.config.as_deref(), connection.profile.as_deref())
        .map_err(|err| CliError::input(t!("config.load_failed", error = err)))?;
    let auth = match profile.auth {
        AuthConfig::Basic {
            username,
            password,
            domain,
        } => PlatformAuth::Basic {
            username,
            password,
            domain,
        },
        AuthConfig::Token(token) => PlatformAuth::Bearer(token),
    };
    let mut config = HttpPlatformConfig::new(profile.hostname, auth);
    config.api_path = profile.api_path;
    config.timeout_ms = profile.timeout_ms;
    config.skip_tls_verify = profile.skip_tls_verify;
    debug!(profile = profile.name.as_str(), "platform profile loaded");
    HttpPlatform::new(config)
        .map_err(|err| CliError::input(t!("gateway.init_failed", error = err)))
}

/// Parses a store type argument.
fn parse_store_type(value: &str) -> CliResult<StoreTypeRef> {
    StoreTypeRef::parse(value).map_err(|err| {
        CliError::input(t!("rot.template.invalid_store_type", value = value, error = err))
    })
}

/// Writes every accumulated error to stderr.
fn report_errors(errors: &ErrorList) -> CliResult<()> {
    for error in errors {
        write_stderr_line(&t!("run.error", error = error))?;
    }
    Ok(())
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::failure(output_error("stdout", &err)))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> CliResult<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}").map_err(|err| CliError::failure(output_error("stderr", &err)))
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = if stream == "stdout" {
        t!("output.stream.stdout")
    } else {
        t!("output.stream.stderr")
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns its exit code.
fn emit_error(err: &CliError) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{err}");
    ExitCode::from(err.code)
}
