// crates/kfutil-core/src/interfaces/mod.rs
// ============================================================================
// Module: kfutil Interfaces
// Description: Platform gateway contract and the records it exchanges.
// Purpose: Decouple the root-of-trust pipeline from the Platform transport.
// Dependencies: crate::core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The pipeline talks to the Platform only through [`PlatformGateway`]. The
//! gateway schedules add/remove jobs but never waits for them; convergence is
//! observed on the next run. Implementations must map transport failures onto
//! [`GatewayError`] variants so callers can classify per-row errors.
//!
//! Secrets never cross this boundary in records returned to callers; store
//! credentials flow only in [`CreateStoreRequest`] bodies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::CertificateRef;
use crate::core::identifiers::StoreId;
use crate::core::identifiers::StoreTypeRef;
use crate::core::store::InventoryEntry;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Certificate record returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Platform certificate id.
    pub id: i64,
    /// Upper-case fingerprint.
    pub thumbprint: String,
    /// Serial number.
    pub serial_number: String,
    /// Subject distinguished name.
    pub issued_dn: String,
    /// Issuer distinguished name.
    pub issuer_dn: String,
    /// Store ids the certificate is known to be deployed to.
    #[serde(default)]
    pub locations: Vec<StoreId>,
}

/// Store record returned by `get_store` and `list_stores`.
///
/// # Invariants
/// - `container_id` is `None` when the Platform reports zero or nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Platform store id.
    pub id: StoreId,
    /// Store type integer id.
    pub store_type_id: i64,
    /// Store type short name when known.
    #[serde(default)]
    pub store_type: String,
    /// Client machine.
    pub client_machine: String,
    /// Store path.
    pub store_path: String,
    /// Container id.
    #[serde(default)]
    pub container_id: Option<i64>,
    /// Container name.
    #[serde(default)]
    pub container_name: String,
    /// Orchestrator agent id.
    #[serde(default)]
    pub agent_id: String,
    /// Inventory interval in minutes, when scheduled by interval.
    #[serde(default)]
    pub inventory_interval_minutes: Option<i64>,
    /// Type-specific store properties, unwrapped to plain values.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Declared property of a store type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTypeProperty {
    /// Property name used as `Properties.<name>`.
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Property type such as `String`, `Bool`, or `Secret`.
    #[serde(default)]
    pub property_type: String,
    /// Whether the property must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Default value rendered as text.
    #[serde(default)]
    pub default_value: String,
}

impl StoreTypeProperty {
    /// Returns true when the property holds a secret.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        self.property_type.eq_ignore_ascii_case("secret")
    }
}

/// Store password options of a store type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordOptions {
    /// Whether per-entry passwords are supported.
    #[serde(default)]
    pub entry_supported: bool,
    /// Whether the store password is required.
    #[serde(default)]
    pub store_required: bool,
    /// Password style reported by the Platform.
    #[serde(default)]
    pub style: String,
}

/// Store type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTypeDescriptor {
    /// Store type integer id.
    pub id: i64,
    /// Short name such as `PEM`.
    pub short_name: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Declared properties in declaration order.
    #[serde(default)]
    pub properties: Vec<StoreTypeProperty>,
    /// Password options.
    #[serde(default)]
    pub password_options: PasswordOptions,
}

/// Filter applied when listing stores. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreFilter {
    /// Store type ids to include.
    pub store_type_ids: Vec<i64>,
    /// Client machine to match exactly.
    pub client_machine: Option<String>,
    /// Container id to match; zero is ignored.
    pub container_id: Option<i64>,
    /// Container name to match exactly.
    pub container_name: Option<String>,
    /// Explicit store ids to include.
    pub store_ids: Vec<StoreId>,
}

impl StoreFilter {
    /// Returns a filter selecting a single store type.
    #[must_use]
    pub fn by_type(store_type_id: i64) -> Self {
        Self {
            store_type_ids: vec![store_type_id],
            ..Self::default()
        }
    }

    /// Returns the container id when it is meaningful.
    #[must_use]
    pub fn effective_container_id(&self) -> Option<i64> {
        self.container_id.filter(|id| *id != 0)
    }

    /// Returns true when the record satisfies every populated field.
    #[must_use]
    pub fn matches(&self, record: &StoreRecord) -> bool {
        if !self.store_type_ids.is_empty() && !self.store_type_ids.contains(&record.store_type_id)
        {
            return false;
        }
        if let Some(machine) = &self.client_machine
            && machine != &record.client_machine
        {
            return false;
        }
        if let Some(container_id) = self.effective_container_id()
            && record.container_id != Some(container_id)
        {
            return false;
        }
        if let Some(name) = &self.container_name
            && name != &record.container_name
        {
            return false;
        }
        self.store_ids.is_empty() || self.store_ids.contains(&record.id)
    }
}

/// Certificate query used to pre-populate templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateQuery {
    /// Collection id to restrict the query to.
    pub collection_id: Option<i64>,
    /// Subject common names to match; empty means any.
    pub common_names: Vec<String>,
}

/// Job schedule; only immediate dispatch is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobSchedule {
    /// Run as soon as possible.
    #[default]
    Immediate,
}

/// One store targeted by an add or remove job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTarget {
    /// Target store id.
    pub store_id: StoreId,
    /// Entry alias; required for removals.
    pub alias: Option<String>,
    /// Whether an existing entry may be overwritten.
    pub overwrite: bool,
}

/// Add or remove job request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateStoreJob {
    /// Platform certificate id.
    pub cert_id: i64,
    /// Target stores.
    pub targets: Vec<JobTarget>,
    /// Dispatch schedule.
    pub schedule: JobSchedule,
}

impl CertificateStoreJob {
    /// Builds an immediate add job for a single store.
    #[must_use]
    pub fn add(cert_id: i64, store_id: StoreId) -> Self {
        Self {
            cert_id,
            targets: vec![JobTarget {
                store_id,
                alias: None,
                overwrite: true,
            }],
            schedule: JobSchedule::Immediate,
        }
    }

    /// Builds an immediate remove job for a single store entry.
    #[must_use]
    pub fn remove(cert_id: i64, store_id: StoreId, alias: impl Into<String>) -> Self {
        Self {
            cert_id,
            targets: vec![JobTarget {
                store_id,
                alias: Some(alias.into()),
                overwrite: true,
            }],
            schedule: JobSchedule::Immediate,
        }
    }
}

/// Job acceptance receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReceipt {
    /// Job ids reported by the Platform, when any.
    pub job_ids: Vec<String>,
}

/// Store creation request produced by bulk import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStoreRequest {
    /// Store type integer id.
    pub store_type_id: i64,
    /// Nested request body built from the CSV row.
    pub body: Map<String, Value>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Platform gateway errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Platform reported a conflicting job.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Platform rejected the request body.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Network or unexpected HTTP failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Response body could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Gateway could not be configured.
    #[error("gateway configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Returns true for `NotFound`.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// ============================================================================
// SECTION: Platform Gateway
// ============================================================================

/// Narrow Platform adapter used by the root-of-trust pipeline.
pub trait PlatformGateway {
    /// Resolves a certificate by fingerprint or id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] when no certificate matches.
    fn lookup_certificate(
        &self,
        reference: &CertificateRef,
    ) -> Result<CertificateRecord, GatewayError>;

    /// Queries certificates for template pre-population.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the query fails.
    fn query_certificates(
        &self,
        query: &CertificateQuery,
    ) -> Result<Vec<CertificateRecord>, GatewayError>;

    /// Lists stores matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the listing fails.
    fn list_stores(&self, filter: &StoreFilter) -> Result<Vec<StoreRecord>, GatewayError>;

    /// Fetches one store.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] when the store does not exist.
    fn get_store(&self, store_id: &StoreId) -> Result<StoreRecord, GatewayError>;

    /// Fetches a store inventory; an unknown inventory is empty.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the fetch fails.
    fn get_store_inventory(&self, store_id: &StoreId) -> Result<Vec<InventoryEntry>, GatewayError>;

    /// Fetches a store type descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] when the type does not exist.
    fn get_store_type(
        &self,
        reference: &StoreTypeRef,
    ) -> Result<StoreTypeDescriptor, GatewayError>;

    /// Schedules an add job.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Conflict`] or [`GatewayError::Validation`] when rejected.
    fn add_certificate_to_stores(
        &self,
        job: &CertificateStoreJob,
    ) -> Result<JobReceipt, GatewayError>;

    /// Schedules a remove job.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when rejected.
    fn remove_certificate_from_stores(
        &self,
        job: &CertificateStoreJob,
    ) -> Result<JobReceipt, GatewayError>;

    /// Creates a store and returns its new id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the Platform rejects the store.
    fn create_store(&self, request: &CreateStoreRequest) -> Result<StoreId, GatewayError>;
}

// ============================================================================
// SECTION: Secret Prompt
// ============================================================================

/// Source of interactively supplied secrets.
pub trait SecretPrompt {
    /// Prompts for a secret; `None` means the operator declined.
    fn prompt_secret(&mut self, label: &str) -> Option<String>;
}

/// Prompt that never yields a value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl SecretPrompt for NoPrompt {
    fn prompt_secret(&mut self, _label: &str) -> Option<String> {
        None
    }
}
