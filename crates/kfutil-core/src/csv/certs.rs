// crates/kfutil-core/src/csv/certs.rs
// ============================================================================
// Module: Certificates CSV
// Description: Add and remove certificate list inputs.
// Purpose: Parse certificate references and emit certificate templates.
// Dependencies: crate::csv, crate::core::identifiers, tracing
// ============================================================================

//! ## Overview
//! The first column carries the certificate reference and must be named one
//! of [`CERT_ID_HEADERS`]. Every other column is ignored on read. A reference
//! is a 40-hex fingerprint or a decimal id; blank cells are skipped and
//! repeated references are dropped, preserving first-seen order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::core::identifiers::CertificateRef;
use crate::csv::CsvError;
use crate::csv::CsvTable;
use crate::csv::read_table;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Accepted names for the identifier column.
pub const CERT_ID_HEADERS: [&str; 5] = ["CertID", "thumbprint", "id", "CertId", "Thumbprint"];

/// Recommended Certificates CSV header.
pub const CERTS_HEADER: [&str; 6] =
    ["Thumbprint", "SubjectName", "Issuer", "CertID", "Locations", "LastQueriedDate"];

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses certificate references from a Certificates CSV table.
///
/// # Errors
///
/// Returns [`CsvError::Header`] when the first column is not an identifier
/// column, or [`CsvError::Row`] when a reference is malformed.
pub fn parse_certificate_refs(table: &CsvTable) -> Result<Vec<CertificateRef>, CsvError> {
    let first = table.header.first().map(String::as_str).unwrap_or_default();
    if !CERT_ID_HEADERS.contains(&first) {
        return Err(CsvError::Header {
            expected: format!("first column one of {}", CERT_ID_HEADERS.join("|")),
            found: table.header.join(","),
        });
    }
    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    for row in &table.rows {
        let raw = row.get(0);
        if raw.is_empty() {
            continue;
        }
        let reference = CertificateRef::parse(raw).map_err(|err| CsvError::Row {
            line: row.line,
            message: err.to_string(),
        })?;
        if seen.insert(reference.clone()) {
            refs.push(reference);
        } else {
            debug!(reference = %reference, "duplicate certificate reference dropped");
        }
    }
    Ok(refs)
}

/// Reads a Certificates CSV file.
///
/// # Errors
///
/// Returns [`CsvError`] when the file is unreadable or malformed.
pub fn read_certificates_csv(path: &Path) -> Result<Vec<CertificateRef>, CsvError> {
    parse_certificate_refs(&read_table(path)?)
}

// ============================================================================
// SECTION: Template Rows
// ============================================================================

/// Row of a certificates template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateRow {
    /// Fingerprint.
    pub thumbprint: String,
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Platform certificate id.
    pub cert_id: i64,
    /// Store ids the certificate is deployed to, `;`-separated.
    pub locations: String,
    /// Timestamp of the query that produced the row.
    pub last_queried: String,
}

impl CertificateRow {
    /// Returns the row values in header order.
    #[must_use]
    pub fn to_cells(&self) -> [String; 6] {
        [
            self.thumbprint.clone(),
            self.subject.clone(),
            self.issuer.clone(),
            self.cert_id.to_string(),
            self.locations.clone(),
            self.last_queried.clone(),
        ]
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
