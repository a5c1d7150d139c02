// crates/kfutil-core/src/runtime/bulk.rs
// ============================================================================
// Module: Bulk Store Operations
// Description: CSV-driven store templates, creation, and export.
// Purpose: Prepare and populate the stores that root-of-trust runs target.
// Dependencies: crate::csv, crate::interfaces, serde_json, tracing
// ============================================================================

//! ## Overview
//! The bulk CSV shape is derived from a store type descriptor (see
//! [`bulk_store_header`]). Import decodes each cell into a typed value and
//! builds a nested request body from the dotted header names. Credentials
//! missing from a row are filled from, in order, command-line values,
//! environment values, and an interactive prompt that is asked at most once
//! per credential. Each row's outcome is written to a results CSV with
//! `Errors` and `StoreId` columns.
//!
//! Export never writes credentials: the Platform does not return them and
//! their cells are left blank.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Map;
use serde_json::Value;
use tracing::info;
use tracing::warn;

use crate::core::errors::ErrorKind;
use crate::core::errors::ErrorList;
use crate::core::errors::RotError;
use crate::core::identifiers::StoreTypeRef;
use crate::csv::CsvError;
use crate::csv::cell::CellValue;
use crate::csv::cell::get_path;
use crate::csv::cell::insert_path;
use crate::csv::cell::render_value;
use crate::csv::create_file;
use crate::csv::read_table;
use crate::csv::template::ERRORS_COLUMN;
use crate::csv::template::PASSWORD_COLUMN;
use crate::csv::template::PROPERTY_PREFIX;
use crate::csv::template::STORE_ID_COLUMN;
use crate::csv::template::TemplateFormat;
use crate::csv::template::bulk_store_header;
use crate::interfaces::CreateStoreRequest;
use crate::interfaces::GatewayError;
use crate::interfaces::PlatformGateway;
use crate::interfaces::SecretPrompt;
use crate::interfaces::StoreFilter;
use crate::interfaces::StoreRecord;
use crate::interfaces::StoreTypeDescriptor;
use crate::runtime::templates::Template;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable supplying a default server username.
pub const ENV_SERVER_USERNAME: &str = "KFUTIL_CSV_SERVER_USERNAME";

/// Environment variable supplying a default server password.
pub const ENV_SERVER_PASSWORD: &str = "KFUTIL_CSV_SERVER_PASSWORD";

/// Environment variable supplying a default store password.
pub const ENV_STORE_PASSWORD: &str = "KFUTIL_CSV_STORE_PASSWORD";

/// Container id column, dropped when blank or zero.
const CONTAINER_ID_COLUMN: &str = "ContainerId";

// ============================================================================
// SECTION: Secrets
// ============================================================================

/// Credential slots filled during import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecretSlot {
    /// `Properties.ServerUsername`.
    ServerUsername,
    /// `Properties.ServerPassword`.
    ServerPassword,
    /// `Password`.
    StorePassword,
}

impl SecretSlot {
    /// Every slot in fill order.
    pub const ALL: [Self; 3] = [Self::ServerUsername, Self::ServerPassword, Self::StorePassword];

    /// Returns the property name, or `None` for the store password.
    #[must_use]
    pub const fn property(self) -> Option<&'static str> {
        match self {
            Self::ServerUsername => Some("ServerUsername"),
            Self::ServerPassword => Some("ServerPassword"),
            Self::StorePassword => None,
        }
    }

    /// Returns the CSV column holding the slot.
    #[must_use]
    pub fn column(self) -> String {
        self.property()
            .map_or_else(|| PASSWORD_COLUMN.to_string(), |name| format!("{PROPERTY_PREFIX}{name}"))
    }

    /// Returns the environment variable for the slot.
    #[must_use]
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::ServerUsername => ENV_SERVER_USERNAME,
            Self::ServerPassword => ENV_SERVER_PASSWORD,
            Self::StorePassword => ENV_STORE_PASSWORD,
        }
    }

    /// Returns the prompt label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ServerUsername => "server username",
            Self::ServerPassword => "server password",
            Self::StorePassword => "store password",
        }
    }
}

/// One value per credential slot.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretValues {
    /// Server username.
    pub server_username: Option<String>,
    /// Server password.
    pub server_password: Option<String>,
    /// Store password.
    pub store_password: Option<String>,
}

impl std::fmt::Debug for SecretValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("SecretValues")
            .field("server_username", &mask(&self.server_username))
            .field("server_password", &mask(&self.server_password))
            .field("store_password", &mask(&self.store_password))
            .finish()
    }
}

impl SecretValues {
    /// Reads values from an environment lookup; blank values are ignored.
    #[must_use]
    pub fn from_env<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let read = |slot: SecretSlot| lookup(slot.env_var()).filter(|value| !value.is_empty());
        Self {
            server_username: read(SecretSlot::ServerUsername),
            server_password: read(SecretSlot::ServerPassword),
            store_password: read(SecretSlot::StorePassword),
        }
    }

    /// Returns the value for a slot.
    #[must_use]
    pub fn get(&self, slot: SecretSlot) -> Option<&str> {
        match slot {
            SecretSlot::ServerUsername => self.server_username.as_deref(),
            SecretSlot::ServerPassword => self.server_password.as_deref(),
            SecretSlot::StorePassword => self.store_password.as_deref(),
        }
    }
}

/// Credential defaults for an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Values supplied on the command line.
    pub flags: SecretValues,
    /// Values supplied by the environment.
    pub env: SecretValues,
}

/// Resolves missing credentials with a per-run prompt cache.
struct SecretResolver<'a> {
    /// Flag and environment defaults.
    options: &'a ImportOptions,
    /// Interactive source.
    prompt: &'a mut dyn SecretPrompt,
    /// Prompt answers, including declined prompts.
    prompted: BTreeMap<SecretSlot, Option<String>>,
}

impl SecretResolver<'_> {
    /// Returns the default for a slot: flag, then env, then prompt.
    fn resolve(&mut self, slot: SecretSlot) -> Option<String> {
        if let Some(value) = self.options.flags.get(slot).or_else(|| self.options.env.get(slot)) {
            return Some(value.to_string());
        }
        if let Some(answer) = self.prompted.get(&slot) {
            return answer.clone();
        }
        let answer = self.prompt.prompt_secret(slot.label()).filter(|value| !value.is_empty());
        self.prompted.insert(slot, answer.clone());
        answer
    }
}

/// Returns the slots a store type declares, with their required flag.
fn declared_slots(descriptor: &StoreTypeDescriptor) -> Vec<(SecretSlot, bool)> {
    SecretSlot::ALL
        .into_iter()
        .filter_map(|slot| match slot.property() {
            Some(name) => descriptor
                .properties
                .iter()
                .find(|property| property.name == name)
                .map(|property| (slot, property.required)),
            None => descriptor.password_options.store_required.then_some((slot, true)),
        })
        .collect()
}

/// Returns true when a column must never be exported.
fn is_sensitive_column(column: &str, descriptor: &StoreTypeDescriptor) -> bool {
    if column == PASSWORD_COLUMN {
        return true;
    }
    let Some(name) = column.strip_prefix(PROPERTY_PREFIX) else {
        return false;
    };
    SecretSlot::ALL.iter().any(|slot| slot.property() == Some(name))
        || descriptor.properties.iter().any(|property| property.name == name && property.is_secret())
}

// ============================================================================
// SECTION: Template
// ============================================================================

/// Fetches a store type and derives its bulk template.
///
/// # Errors
///
/// Returns a lookup [`RotError`] when the store type cannot be fetched.
pub fn bulk_template(
    gateway: &dyn PlatformGateway,
    store_type: &StoreTypeRef,
) -> Result<(StoreTypeDescriptor, Template), RotError> {
    let descriptor = fetch_store_type(gateway, store_type)?;
    let template = Template::header_only(bulk_store_header(&descriptor).as_slice());
    Ok((descriptor, template))
}

/// Fetches a store type descriptor.
fn fetch_store_type(
    gateway: &dyn PlatformGateway,
    store_type: &StoreTypeRef,
) -> Result<StoreTypeDescriptor, RotError> {
    gateway.get_store_type(store_type).map_err(|err| {
        let kind = if err.is_not_found() { ErrorKind::Lookup } else { ErrorKind::Transport };
        RotError::with_subject(kind, store_type.to_string(), err.to_string())
    })
}

// ============================================================================
// SECTION: Import
// ============================================================================

/// Result of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Stores created.
    pub created: usize,
    /// Rows that failed.
    pub failed: usize,
    /// Results CSV path.
    pub results_path: PathBuf,
    /// Per-row errors.
    pub errors: ErrorList,
}

/// Returns `<stem>_results.csv` next to `path`.
#[must_use]
pub fn results_path_for(path: &Path) -> PathBuf {
    let stem = path.file_stem().map_or_else(|| "stores".into(), |stem| stem.to_string_lossy());
    path.with_file_name(format!("{stem}_results.csv"))
}

/// Creates one store per CSV row and writes a results CSV.
///
/// # Errors
///
/// Returns an input [`RotError`] when the CSV is unreadable or its header is
/// invalid, a lookup error when the store type is unknown, or an internal
/// error when the results CSV cannot be written.
pub fn import_stores(
    gateway: &dyn PlatformGateway,
    store_type: &StoreTypeRef,
    input: &Path,
    results: &Path,
    options: &ImportOptions,
    prompt: &mut dyn SecretPrompt,
) -> Result<ImportReport, RotError> {
    let table = read_table(input)?;
    let mut unique = BTreeSet::new();
    for column in &table.header {
        if column.is_empty() {
            return Err(CsvError::Header {
                expected: "non-empty column names".to_string(),
                found: table.header.join(","),
            }
            .into());
        }
        if !unique.insert(column.as_str()) {
            return Err(RotError::input(format!("duplicate column `{column}` in {}", input.display())));
        }
    }
    let descriptor = fetch_store_type(gateway, store_type)?;
    let slots = declared_slots(&descriptor);
    let columns: Vec<(usize, &str)> = table
        .header
        .iter()
        .enumerate()
        .filter(|(_, column)| column.as_str() != ERRORS_COLUMN && column.as_str() != STORE_ID_COLUMN)
        .map(|(index, column)| (index, column.as_str()))
        .collect();

    let to_internal = |err: CsvError| RotError::internal(format!("writing results csv: {err}"));
    let mut csv = create_file(results).map_err(to_internal)?;
    let mut header: Vec<&str> = columns.iter().map(|(_, column)| *column).collect();
    header.push(ERRORS_COLUMN);
    header.push(STORE_ID_COLUMN);
    csv.write_record(header.as_slice()).map_err(to_internal)?;

    let mut resolver = SecretResolver {
        options,
        prompt,
        prompted: BTreeMap::new(),
    };
    let mut report = ImportReport {
        results_path: results.to_path_buf(),
        ..ImportReport::default()
    };
    for row in &table.rows {
        let mut body = Map::new();
        for (index, column) in &columns {
            let cell = CellValue::parse(row.get(*index));
            if cell.is_empty() {
                continue;
            }
            if *column == CONTAINER_ID_COLUMN && cell == CellValue::Int(0) {
                continue;
            }
            insert_path(&mut body, column, cell.into_json());
        }
        let outcome = fill_secrets(&mut body, &slots, &mut resolver).and_then(|()| {
            gateway
                .create_store(&CreateStoreRequest {
                    store_type_id: descriptor.id,
                    body,
                })
                .map_err(|err: GatewayError| err.to_string())
        });
        let (error_cell, id_cell) = match outcome {
            Ok(store_id) => {
                info!(line = row.line, store_id = %store_id, "store created");
                report.created += 1;
                (String::new(), store_id.to_string())
            }
            Err(message) => {
                warn!(line = row.line, error = message.as_str(), "store creation failed");
                report.failed += 1;
                report.errors.push(RotError::with_subject(
                    ErrorKind::Apply,
                    format!("row {}", row.line),
                    message.clone(),
                ));
                (message, String::new())
            }
        };
        let mut cells: Vec<String> =
            columns.iter().map(|(index, _)| row.get(*index).to_string()).collect();
        cells.push(error_cell);
        cells.push(id_cell);
        csv.write_record(cells.as_slice()).map_err(to_internal)?;
    }
    Ok(report)
}

/// Fills missing credential slots; a missing required slot fails the row.
fn fill_secrets(
    body: &mut Map<String, Value>,
    slots: &[(SecretSlot, bool)],
    resolver: &mut SecretResolver<'_>,
) -> Result<(), String> {
    for (slot, required) in slots {
        let column = slot.column();
        if get_path(body, &column).is_some() {
            continue;
        }
        match resolver.resolve(*slot) {
            Some(value) => insert_path(body, &column, Value::String(value)),
            None if *required => return Err(format!("missing required {}", slot.label())),
            None => {}
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Export
// ============================================================================

/// Result of a bulk export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Rows written.
    pub rows: usize,
    /// Output path.
    pub path: PathBuf,
    /// Per-store errors.
    pub errors: ErrorList,
}

/// Writes every store of a type as a bulk CSV without credentials.
///
/// The header is the bulk template header followed by `StoreId`.
///
/// # Errors
///
/// Returns a lookup [`RotError`] when the store type or listing fails, or an
/// internal error when the output cannot be written.
pub fn export_stores(
    gateway: &dyn PlatformGateway,
    store_type: &StoreTypeRef,
    output: &Path,
) -> Result<ExportReport, RotError> {
    let descriptor = fetch_store_type(gateway, store_type)?;
    let listed = gateway.list_stores(&StoreFilter::by_type(descriptor.id)).map_err(|err| {
        RotError::with_subject(ErrorKind::Transport, descriptor.short_name.clone(), err.to_string())
    })?;
    let mut header = bulk_store_header(&descriptor);
    header.push(STORE_ID_COLUMN.to_string());

    let mut report = ExportReport {
        path: output.to_path_buf(),
        ..ExportReport::default()
    };
    let mut template = Template::header_only(header.as_slice());
    for summary in listed {
        let record = match gateway.get_store(&summary.id) {
            Ok(record) => record,
            Err(err) => {
                warn!(store_id = %summary.id, error = %err, "store fetch failed");
                report.errors.push(RotError::with_subject(
                    ErrorKind::Lookup,
                    summary.id.to_string(),
                    err.to_string(),
                ));
                continue;
            }
        };
        template.rows.push(export_row(&header, &record, &descriptor));
    }
    report.rows = template.rows.len();
    template.write(output, TemplateFormat::Csv)?;
    info!(path = %output.display(), rows = report.rows, "stores exported");
    Ok(report)
}

/// Renders one exported store aligned with `header`.
fn export_row(header: &[String], record: &StoreRecord, descriptor: &StoreTypeDescriptor) -> Vec<String> {
    header
        .iter()
        .map(|column| {
            if is_sensitive_column(column, descriptor) {
                return String::new();
            }
            match column.as_str() {
                CONTAINER_ID_COLUMN => {
                    record.container_id.filter(|id| *id != 0).map(|id| id.to_string()).unwrap_or_default()
                }
                "ClientMachine" => record.client_machine.clone(),
                "StorePath" => record.store_path.clone(),
                "AgentId" => record.agent_id.clone(),
                "InventorySchedule.Interval.Minutes" => {
                    record.inventory_interval_minutes.map(|minutes| minutes.to_string()).unwrap_or_default()
                }
                STORE_ID_COLUMN => record.id.to_string(),
                other => other
                    .strip_prefix(PROPERTY_PREFIX)
                    .and_then(|name| record.properties.get(name))
                    .map(render_value)
                    .unwrap_or_default(),
            }
        })
        .collect()
}
