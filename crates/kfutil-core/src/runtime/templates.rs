// crates/kfutil-core/src/runtime/templates.rs
// ============================================================================
// Module: Input Templates
// Description: Builds starter CSV or JSON files for root-of-trust inputs.
// Purpose: Pre-populate certificate and store lists from Platform queries.
// Dependencies: crate::csv, crate::interfaces, serde_json, tracing
// ============================================================================

//! ## Overview
//! Templates carry the exact header the matching parser expects. Certificate
//! and store templates are optionally pre-populated from gateway queries; the
//! actions template is header-only. Query failures are recorded and the
//! template is still produced with whatever rows were resolved.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use time::OffsetDateTime;
use tracing::warn;

use crate::core::errors::ErrorKind;
use crate::core::errors::ErrorList;
use crate::core::errors::RotError;
use crate::core::identifiers::StoreTypeRef;
use crate::core::time::format_rfc3339;
use crate::csv::audit::AUDIT_HEADER;
use crate::csv::certs::CERTS_HEADER;
use crate::csv::certs::CertificateRow;
use crate::csv::create_file;
use crate::csv::stores::STORES_HEADER;
use crate::csv::stores::StoreRow;
use crate::csv::template::TemplateFormat;
use crate::csv::template::header_to_json;
use crate::csv::template::rows_to_json;
use crate::interfaces::CertificateQuery;
use crate::interfaces::PlatformGateway;
use crate::interfaces::StoreFilter;

// ============================================================================
// SECTION: Template
// ============================================================================

/// Header plus rows ready to render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    /// Header columns.
    pub header: Vec<String>,
    /// Data rows, each aligned with the header.
    pub rows: Vec<Vec<String>>,
}

impl Template {
    /// Creates a header-only template.
    #[must_use]
    pub fn header_only<S: AsRef<str>>(header: &[S]) -> Self {
        Self {
            header: header.iter().map(|column| column.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Writes the template to `path` in `format`.
    ///
    /// # Errors
    ///
    /// Returns an internal [`RotError`] when the file cannot be written.
    pub fn write(&self, path: &Path, format: TemplateFormat) -> Result<(), RotError> {
        let to_internal =
            |err: String| RotError::internal(format!("writing {}: {err}", path.display()));
        match format {
            TemplateFormat::Csv => {
                let mut csv = create_file(path).map_err(|err| to_internal(err.to_string()))?;
                csv.write_record(self.header.as_slice()).map_err(|err| to_internal(err.to_string()))?;
                for row in &self.rows {
                    csv.write_record(row.as_slice()).map_err(|err| to_internal(err.to_string()))?;
                }
                Ok(())
            }
            TemplateFormat::Json => {
                let value = if self.rows.is_empty() {
                    header_to_json(self.header.as_slice())
                } else {
                    rows_to_json(self.header.as_slice(), self.rows.as_slice())
                };
                let mut text = serde_json::to_string_pretty(&value)
                    .map_err(|err| to_internal(err.to_string()))?;
                text.push('\n');
                fs::write(path, text).map_err(|err| to_internal(err.to_string()))
            }
        }
    }
}

// ============================================================================
// SECTION: Root-of-Trust Templates
// ============================================================================

/// Root-of-trust input kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Certificates list.
    Certs,
    /// Stores list.
    Stores,
    /// Audit actions.
    Actions,
}

impl TemplateKind {
    /// Returns the stable lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Certs => "certs",
            Self::Stores => "stores",
            Self::Actions => "actions",
        }
    }

    /// Returns the header the matching parser expects.
    #[must_use]
    pub const fn header(self) -> &'static [&'static str] {
        match self {
            Self::Certs => &CERTS_HEADER,
            Self::Stores => &STORES_HEADER,
            Self::Actions => &AUDIT_HEADER,
        }
    }

    /// Returns the default output path `<kind>_template.<format>`.
    #[must_use]
    pub fn default_path(self, format: TemplateFormat) -> PathBuf {
        PathBuf::from(format!("{}_template.{}", self.as_str(), format.extension()))
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "certs" | "certificates" => Ok(Self::Certs),
            "stores" => Ok(Self::Stores),
            "actions" | "audit" => Ok(Self::Actions),
            other => Err(format!("unsupported template type: {other}")),
        }
    }
}

/// Filters used to pre-populate a root-of-trust template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFilters {
    /// Store types to list, by name or id.
    pub store_types: Vec<StoreTypeRef>,
    /// Container name to match.
    pub container_name: Option<String>,
    /// Client machine to match.
    pub client_machine: Option<String>,
    /// Certificate collection id.
    pub collection_id: Option<i64>,
    /// Certificate common names.
    pub common_names: Vec<String>,
}

/// Builds a header-only template for `kind` without querying the Platform.
#[must_use]
pub fn header_template(kind: TemplateKind) -> Template {
    Template::header_only(kind.header())
}

/// Builds a root-of-trust template.
#[must_use]
pub fn build_rot_template(
    gateway: &dyn PlatformGateway,
    kind: TemplateKind,
    filters: &TemplateFilters,
    now: OffsetDateTime,
) -> (Template, ErrorList) {
    let mut errors = ErrorList::new();
    let template = match kind {
        TemplateKind::Certs => certificate_template(gateway, filters, now, &mut errors),
        TemplateKind::Stores => store_template(gateway, filters, now, &mut errors),
        TemplateKind::Actions => header_template(TemplateKind::Actions),
    };
    (template, errors)
}

/// Builds the certificates template.
fn certificate_template(
    gateway: &dyn PlatformGateway,
    filters: &TemplateFilters,
    now: OffsetDateTime,
    errors: &mut ErrorList,
) -> Template {
    let mut template = header_template(TemplateKind::Certs);
    if filters.collection_id.is_none() && filters.common_names.is_empty() {
        return template;
    }
    let query = CertificateQuery {
        collection_id: filters.collection_id,
        common_names: filters.common_names.clone(),
    };
    match gateway.query_certificates(&query) {
        Ok(records) => {
            let queried = format_rfc3339(now);
            template.rows = records
                .into_iter()
                .map(|record| {
                    CertificateRow {
                        thumbprint: record.thumbprint.to_ascii_uppercase(),
                        subject: record.issued_dn,
                        issuer: record.issuer_dn,
                        cert_id: record.id,
                        locations: record
                            .locations
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(";"),
                        last_queried: queried.clone(),
                    }
                    .to_cells()
                    .to_vec()
                })
                .collect();
        }
        Err(err) => {
            warn!(error = %err, "certificate query failed");
            errors.push(RotError::with_subject(ErrorKind::Lookup, "certificates", err.to_string()));
        }
    }
    template
}

/// Builds the stores template.
fn store_template(
    gateway: &dyn PlatformGateway,
    filters: &TemplateFilters,
    now: OffsetDateTime,
    errors: &mut ErrorList,
) -> Template {
    let mut template = header_template(TemplateKind::Stores);
    if filters.store_types.is_empty()
        && filters.container_name.is_none()
        && filters.client_machine.is_none()
    {
        return template;
    }
    let mut type_names = BTreeMap::new();
    for reference in &filters.store_types {
        match gateway.get_store_type(reference) {
            Ok(descriptor) => {
                type_names.insert(descriptor.id, descriptor.short_name);
            }
            Err(err) => {
                warn!(store_type = %reference, error = %err, "store type lookup failed");
                errors.push(RotError::with_subject(
                    ErrorKind::Lookup,
                    reference.to_string(),
                    err.to_string(),
                ));
            }
        }
    }
    if !filters.store_types.is_empty() && type_names.is_empty() {
        return template;
    }
    let filter = StoreFilter {
        store_type_ids: type_names.keys().copied().collect(),
        client_machine: filters.client_machine.clone(),
        container_id: None,
        container_name: filters.container_name.clone(),
        store_ids: Vec::new(),
    };
    match gateway.list_stores(&filter) {
        Ok(records) => {
            let queried = format_rfc3339(now);
            template.rows = records
                .into_iter()
                .map(|record| {
                    let store_type = type_names
                        .get(&record.store_type_id)
                        .cloned()
                        .unwrap_or(record.store_type);
                    StoreRow {
                        store_id: record.id,
                        store_type,
                        client_machine: record.client_machine,
                        store_path: record.store_path,
                        container_id: record.container_id.filter(|id| *id != 0),
                        container_name: record.container_name,
                        last_queried: queried.clone(),
                    }
                    .to_cells()
                    .to_vec()
                })
                .collect();
        }
        Err(err) => {
            warn!(error = %err, "store listing failed");
            errors.push(RotError::with_subject(ErrorKind::Lookup, "stores", err.to_string()));
        }
    }
    template
}
