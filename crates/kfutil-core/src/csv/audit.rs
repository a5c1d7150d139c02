// crates/kfutil-core/src/csv/audit.rs
// ============================================================================
// Module: Audit CSV
// Description: On-disk form of a plan and of the reconciled outcome.
// Purpose: Let operators review and edit plans before they are applied.
// Dependencies: crate::csv, crate::core, time
// ============================================================================

//! ## Overview
//! One row per (certificate, store) pair. Flags are written as lower-case
//! `true`/`false` and accepted in any case. The reconciled file has the same
//! columns with `ReconciledDate` in place of `AuditDate`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;

use time::OffsetDateTime;

use crate::core::action::Action;
use crate::core::action::ActionCertificate;
use crate::core::action::ActionKind;
use crate::core::identifiers::StoreId;
use crate::core::time::format_rfc3339;
use crate::core::time::parse_rfc3339;
use crate::csv::CsvError;
use crate::csv::CsvRow;
use crate::csv::CsvTable;
use crate::csv::CsvWriter;
use crate::csv::read_table;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Audit CSV header.
pub const AUDIT_HEADER: [&str; 12] = [
    "Thumbprint",
    "CertID",
    "SubjectName",
    "Issuer",
    "StoreID",
    "StoreType",
    "Machine",
    "Path",
    "AddCert",
    "RemoveCert",
    "Deployed",
    "AuditDate",
];

/// Reconciled CSV header.
pub const RECONCILED_HEADER: [&str; 12] = [
    "Thumbprint",
    "CertID",
    "SubjectName",
    "Issuer",
    "StoreID",
    "StoreType",
    "Machine",
    "Path",
    "AddCert",
    "RemoveCert",
    "Deployed",
    "ReconciledDate",
];

/// Which of the two artifact shapes a writer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditShape {
    /// Plan artifact ending in `AuditDate`.
    Audit,
    /// Outcome artifact ending in `ReconciledDate`.
    Reconciled,
}

impl AuditShape {
    /// Returns the header for the shape.
    #[must_use]
    pub const fn header(self) -> &'static [&'static str; 12] {
        match self {
            Self::Audit => &AUDIT_HEADER,
            Self::Reconciled => &RECONCILED_HEADER,
        }
    }
}

// ============================================================================
// SECTION: Record
// ============================================================================

/// One audit row as written on disk.
///
/// Flags are kept as read so that a row with both flags set can be reported
/// rather than silently reinterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// One-based source line, zero for records not read from a file.
    pub line: usize,
    /// Fingerprint, possibly blank.
    pub thumbprint: String,
    /// Platform certificate id, `-1` when unknown.
    pub cert_id: i64,
    /// Subject distinguished name.
    pub subject_dn: String,
    /// Issuer distinguished name.
    pub issuer_dn: String,
    /// Store id, possibly blank.
    pub store_id: String,
    /// Store type short name.
    pub store_type: String,
    /// Client machine.
    pub machine: String,
    /// Store path.
    pub path: String,
    /// `AddCert` flag.
    pub add: bool,
    /// `RemoveCert` flag.
    pub remove: bool,
    /// `Deployed` flag.
    pub deployed: bool,
    /// Row timestamp when present.
    pub timestamp: Option<OffsetDateTime>,
}

impl AuditRecord {
    /// Builds the record for an action.
    #[must_use]
    pub fn from_action(action: &Action) -> Self {
        Self {
            line: 0,
            thumbprint: action.certificate.thumbprint.clone(),
            cert_id: action.certificate.cert_id,
            subject_dn: action.certificate.subject_dn.clone(),
            issuer_dn: action.certificate.issuer_dn.clone(),
            store_id: action.store_id.to_string(),
            store_type: action.store_type.clone(),
            machine: action.machine.clone(),
            path: action.store_path.clone(),
            add: action.is_add(),
            remove: action.is_remove(),
            deployed: action.deployed,
            timestamp: Some(action.audit_timestamp),
        }
    }

    /// Returns the planned kind, or `None` when both flags are set.
    #[must_use]
    pub const fn kind(&self) -> Option<ActionKind> {
        ActionKind::from_flags(self.add, self.remove)
    }

    /// Converts the record into an action.
    ///
    /// Returns `None` when both flags are set. A missing timestamp is replaced
    /// with `fallback`.
    #[must_use]
    pub fn to_action(&self, fallback: OffsetDateTime) -> Option<Action> {
        let kind = self.kind()?;
        Some(Action {
            certificate: ActionCertificate {
                thumbprint: self.thumbprint.clone(),
                cert_id: self.cert_id,
                subject_dn: self.subject_dn.clone(),
                issuer_dn: self.issuer_dn.clone(),
            },
            store_id: StoreId::new(self.store_id.clone()),
            store_type: self.store_type.clone(),
            store_path: self.path.clone(),
            machine: self.machine.clone(),
            kind,
            deployed: self.deployed,
            audit_timestamp: self.timestamp.unwrap_or(fallback),
        })
    }

    /// Returns the row values with `timestamp` rendered in the last column.
    #[must_use]
    pub fn to_cells(&self, timestamp: OffsetDateTime) -> [String; 12] {
        [
            self.thumbprint.clone(),
            self.cert_id.to_string(),
            self.subject_dn.clone(),
            self.issuer_dn.clone(),
            self.store_id.clone(),
            self.store_type.clone(),
            self.machine.clone(),
            self.path.clone(),
            self.add.to_string(),
            self.remove.to_string(),
            self.deployed.to_string(),
            format_rfc3339(timestamp),
        ]
    }

    /// Parses one data row.
    fn parse_row(row: &CsvRow) -> Result<Self, CsvError> {
        let row_error = |message: String| CsvError::Row {
            line: row.line,
            message,
        };
        let cert_id = match row.get(1) {
            "" => -1,
            raw => raw.parse::<i64>().map_err(|_| row_error(format!("invalid CertID `{raw}`")))?,
        };
        let timestamp = match row.get(11) {
            "" => None,
            raw => Some(
                parse_rfc3339(raw).map_err(|_| row_error(format!("invalid timestamp `{raw}`")))?,
            ),
        };
        Ok(Self {
            line: row.line,
            thumbprint: row.get(0).to_string(),
            cert_id,
            subject_dn: row.get(2).to_string(),
            issuer_dn: row.get(3).to_string(),
            store_id: row.get(4).to_string(),
            store_type: row.get(5).to_string(),
            machine: row.get(6).to_string(),
            path: row.get(7).to_string(),
            add: parse_flag(row.get(8)).ok_or_else(|| row_error(flag_message("AddCert", row.get(8))))?,
            remove: parse_flag(row.get(9))
                .ok_or_else(|| row_error(flag_message("RemoveCert", row.get(9))))?,
            deployed: parse_flag(row.get(10))
                .ok_or_else(|| row_error(flag_message("Deployed", row.get(10))))?,
            timestamp,
        })
    }
}

/// Parses a flag cell; blank reads as false.
#[must_use]
pub fn parse_flag(raw: &str) -> Option<bool> {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("false") {
        Some(false)
    } else if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else {
        None
    }
}

/// Formats an invalid-flag message.
fn flag_message(column: &str, raw: &str) -> String {
    format!("invalid {column} value `{raw}`, expected true or false")
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses an audit table.
///
/// # Errors
///
/// Returns [`CsvError`] on a header mismatch or a malformed row.
pub fn parse_audit(table: &CsvTable) -> Result<Vec<AuditRecord>, CsvError> {
    table.require_header(&AUDIT_HEADER)?;
    table.rows.iter().map(AuditRecord::parse_row).collect()
}

/// Reads an audit CSV file.
///
/// # Errors
///
/// Returns [`CsvError`] when the file is unreadable or malformed.
pub fn read_audit_csv(path: &Path) -> Result<Vec<AuditRecord>, CsvError> {
    parse_audit(&read_table(path)?)
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Streaming writer for audit and reconciled artifacts.
#[derive(Debug)]
pub struct AuditWriter<W: Write> {
    /// Underlying record writer.
    csv: CsvWriter<W>,
}

impl<W: Write> AuditWriter<W> {
    /// Writes the header for `shape` and returns the writer.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Io`] when the header cannot be written.
    pub fn new(mut csv: CsvWriter<W>, shape: AuditShape) -> Result<Self, CsvError> {
        csv.write_record(shape.header())?;
        Ok(Self {
            csv,
        })
    }

    /// Writes one action stamped with its own planning time.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Io`] when the sink fails.
    pub fn write_action(&mut self, action: &Action) -> Result<(), CsvError> {
        self.write_record(&AuditRecord::from_action(action), action.audit_timestamp)
    }

    /// Writes one record stamped with `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Io`] when the sink fails.
    pub fn write_record(
        &mut self,
        record: &AuditRecord,
        timestamp: OffsetDateTime,
    ) -> Result<(), CsvError> {
        self.csv.write_record(&record.to_cells(timestamp))?;
        Ok(())
    }

    /// Returns the underlying sink.
    pub fn into_inner(self) -> W {
        self.csv.into_inner()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
