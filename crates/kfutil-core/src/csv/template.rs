// crates/kfutil-core/src/csv/template.rs
// ============================================================================
// Module: CSV Templates
// Description: Header derivation from store-type descriptors and JSON rendering.
// Purpose: Produce editable input templates for bulk and root-of-trust runs.
// Dependencies: crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! A bulk store template header is derived from a store type descriptor:
//! fixed store columns, then `Properties.<name>` per declared property in
//! declaration order, then `Password` when the store password is required.
//! Templates may also be rendered as a JSON array of objects keyed by header.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde_json::Map;
use serde_json::Value;

use crate::interfaces::StoreTypeDescriptor;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed leading columns of a bulk store template.
pub const BULK_FIXED_COLUMNS: [&str; 6] = [
    "ContainerId",
    "ClientMachine",
    "StorePath",
    "CreateIfMissing",
    "AgentId",
    "InventorySchedule.Interval.Minutes",
];

/// Prefix of property columns.
pub const PROPERTY_PREFIX: &str = "Properties.";

/// Store password column.
pub const PASSWORD_COLUMN: &str = "Password";

/// Outcome column appended by bulk import.
pub const ERRORS_COLUMN: &str = "Errors";

/// New store id column appended by bulk import.
pub const STORE_ID_COLUMN: &str = "StoreId";

// ============================================================================
// SECTION: Formats
// ============================================================================

/// Template output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateFormat {
    /// Dialect CSV.
    #[default]
    Csv,
    /// JSON array of objects.
    Json,
}

impl TemplateFormat {
    /// Returns the file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TemplateFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported template format: {other}")),
        }
    }
}

// ============================================================================
// SECTION: Headers
// ============================================================================

/// Returns the `Properties.<name>` column for a property.
#[must_use]
pub fn property_column(name: &str) -> String {
    format!("{PROPERTY_PREFIX}{name}")
}

/// Derives the bulk store header for a store type.
#[must_use]
pub fn bulk_store_header(descriptor: &StoreTypeDescriptor) -> Vec<String> {
    let mut header: Vec<String> = BULK_FIXED_COLUMNS.iter().map(ToString::to_string).collect();
    header.extend(descriptor.properties.iter().map(|property| property_column(&property.name)));
    if descriptor.password_options.store_required {
        header.push(PASSWORD_COLUMN.to_string());
    }
    header
}

// ============================================================================
// SECTION: JSON Rendering
// ============================================================================

/// Renders rows as an array of objects keyed by header name.
///
/// Short rows leave their trailing keys empty.
#[must_use]
pub fn rows_to_json<H: AsRef<str>, C: AsRef<str>>(header: &[H], rows: &[Vec<C>]) -> Value {
    let objects = rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for (index, column) in header.iter().enumerate() {
                let cell = row.get(index).map_or("", AsRef::as_ref);
                object.insert(column.as_ref().to_string(), Value::String(cell.to_string()));
            }
            Value::Object(object)
        })
        .collect();
    Value::Array(objects)
}

/// Renders a header-only template as a one-element JSON array of empty fields.
#[must_use]
pub fn header_to_json<H: AsRef<str>>(header: &[H]) -> Value {
    rows_to_json::<H, &str>(header, &[Vec::new()])
}

// ============================================================================
// SECTION: Tests
// ============================================================================
