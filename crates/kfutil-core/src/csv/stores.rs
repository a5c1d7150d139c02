// crates/kfutil-core/src/csv/stores.rs
// ============================================================================
// Module: Stores CSV
// Description: Root-of-trust store list input.
// Purpose: Parse and emit the candidate store list.
// Dependencies: crate::csv, tracing
// ============================================================================

//! ## Overview
//! Only `StoreID` is required. The remaining columns are informational and
//! are refreshed from Platform state before planning. Duplicate store ids
//! keep their first row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;

use tracing::warn;

use crate::core::identifiers::StoreId;
use crate::core::store::TrustStore;
use crate::csv::CsvError;
use crate::csv::CsvTable;
use crate::csv::read_table;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Stores CSV header.
pub const STORES_HEADER: [&str; 7] = [
    "StoreID",
    "StoreType",
    "StoreMachine",
    "StorePath",
    "ContainerId",
    "ContainerName",
    "LastQueriedDate",
];

// ============================================================================
// SECTION: Rows
// ============================================================================

/// One Stores CSV row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreRow {
    /// Platform store id.
    pub store_id: StoreId,
    /// Store type short name.
    pub store_type: String,
    /// Client machine.
    pub client_machine: String,
    /// Store path.
    pub store_path: String,
    /// Container id; zero and blank read as absent.
    pub container_id: Option<i64>,
    /// Container name.
    pub container_name: String,
    /// Last refresh timestamp, informational.
    pub last_queried: String,
}

impl StoreRow {
    /// Converts the row into an empty trust store seeded with its columns.
    #[must_use]
    pub fn into_trust_store(self) -> TrustStore {
        let mut store = TrustStore::new(self.store_id);
        store.store_type = self.store_type;
        store.client_machine = self.client_machine;
        store.store_path = self.store_path;
        store.container_id = self.container_id;
        store.container_name = self.container_name;
        store.last_queried = self.last_queried;
        store
    }

    /// Returns the row values in header order.
    #[must_use]
    pub fn to_cells(&self) -> [String; 7] {
        [
            self.store_id.to_string(),
            self.store_type.clone(),
            self.client_machine.clone(),
            self.store_path.clone(),
            self.container_id.map(|id| id.to_string()).unwrap_or_default(),
            self.container_name.clone(),
            self.last_queried.clone(),
        ]
    }
}

/// Parses a container id cell; blank, zero, and non-numeric read as absent.
#[must_use]
pub fn parse_container_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id != 0)
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a Stores CSV table.
///
/// # Errors
///
/// Returns [`CsvError`] on a header mismatch or a row without a store id.
pub fn parse_stores(table: &CsvTable) -> Result<Vec<StoreRow>, CsvError> {
    table.require_header(&STORES_HEADER)?;
    let mut seen = BTreeSet::new();
    let mut rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let store_id = row.get(0);
        if store_id.is_empty() {
            return Err(CsvError::Row {
                line: row.line,
                message: "missing StoreID".to_string(),
            });
        }
        if !seen.insert(store_id.to_string()) {
            warn!(store_id, line = row.line, "duplicate store id ignored");
            continue;
        }
        rows.push(StoreRow {
            store_id: StoreId::new(store_id),
            store_type: row.get(1).to_string(),
            client_machine: row.get(2).to_string(),
            store_path: row.get(3).to_string(),
            container_id: parse_container_id(row.get(4)),
            container_name: row.get(5).to_string(),
            last_queried: row.get(6).to_string(),
        });
    }
    Ok(rows)
}

/// Reads a Stores CSV file.
///
/// # Errors
///
/// Returns [`CsvError`] when the file is unreadable or malformed.
pub fn read_stores_csv(path: &Path) -> Result<Vec<StoreRow>, CsvError> {
    parse_stores(&read_table(path)?)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;
    use crate::csv::parse_table;

    const HEADER: &str = "StoreID,StoreType,StoreMachine,StorePath,ContainerId,ContainerName,LastQueriedDate";

    #[test]
    fn rows_parse_with_optional_columns() {
        let text = format!("{HEADER}\ns1,PEM,host-a,/etc/ssl/certs,0,,\ns2\n");
        let rows = parse_stores(&parse_table(&text).unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].client_machine, "host-a");
        assert_eq!(rows[0].container_id, None);
        assert_eq!(rows[1].store_id.as_str(), "s2");
        assert_eq!(rows[1].store_path, "");
    }

    #[test]
    fn duplicates_keep_first_row() {
        let text = format!("{HEADER}\ns1,PEM,a\ns1,PEM,b\n");
        let rows = parse_stores(&parse_table(&text).unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].client_machine, "a");
    }

    #[test]
    fn missing_store_id_is_rejected() {
        let text = format!("{HEADER}\n,PEM,a\n");
        let err = parse_stores(&parse_table(&text).unwrap()).unwrap_err();
        assert_eq!(
            err,
            CsvError::Row {
                line: 2,
                message: "missing StoreID".to_string()
            }
        );
    }

    #[test]
    fn foreign_header_is_rejected() {
        let table = parse_table("StoreId,Type\ns1,PEM\n").unwrap();
        assert!(matches!(parse_stores(&table), Err(CsvError::Header { .. })));
    }
}
