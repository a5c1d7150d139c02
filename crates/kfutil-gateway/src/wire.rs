// crates/kfutil-gateway/src/wire.rs
// ============================================================================
// Module: Platform Wire Format
// Description: Request and response bodies of the Platform REST API.
// Purpose: Translate between Platform JSON and kfutil-core records.
// Dependencies: kfutil-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Platform bodies use `PascalCase` keys. Store properties travel as a JSON
//! document encoded into a string, each property wrapped as `{"value": v}`;
//! store passwords travel as `{"Value": secret}`. Decoding unwraps both so
//! core records only see plain values.
//!
//! Invariants:
//! - A container id of zero is never serialized.
//! - Fingerprints are upper-cased on decode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use kfutil_core::CertificateRecord;
use kfutil_core::CertificateStoreJob;
use kfutil_core::CreateStoreRequest;
use kfutil_core::GatewayError;
use kfutil_core::InventoryCertificate;
use kfutil_core::InventoryEntry;
use kfutil_core::PasswordOptions;
use kfutil_core::StoreId;
use kfutil_core::StoreRecord;
use kfutil_core::StoreTypeDescriptor;
use kfutil_core::StoreTypeProperty;
use kfutil_core::core::identifiers::normalize_thumbprint;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Body key for the store type id of a store.
const STORE_TYPE_KEY: &str = "CertStoreType";

/// Body key for store properties.
const PROPERTIES_KEY: &str = "Properties";

/// Body key for the store password.
const PASSWORD_KEY: &str = "Password";

/// Body key for the container id.
const CONTAINER_ID_KEY: &str = "ContainerId";

// ============================================================================
// SECTION: Certificates
// ============================================================================

/// Certificate as returned by `Certificates` endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CertificateBody {
    /// Platform certificate id.
    pub id: i64,
    /// Fingerprint.
    #[serde(default)]
    pub thumbprint: String,
    /// Serial number.
    #[serde(default)]
    pub serial_number: String,
    /// Subject distinguished name.
    #[serde(rename = "IssuedDN", default)]
    pub issued_dn: Option<String>,
    /// Issuer distinguished name.
    #[serde(rename = "IssuerDN", default)]
    pub issuer_dn: Option<String>,
    /// Stores holding the certificate.
    #[serde(default)]
    pub locations: Vec<LocationBody>,
}

/// Certificate location entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LocationBody {
    /// Store id.
    pub store_id: String,
}

impl From<CertificateBody> for CertificateRecord {
    fn from(body: CertificateBody) -> Self {
        Self {
            id: body.id,
            thumbprint: normalize_thumbprint(&body.thumbprint),
            serial_number: body.serial_number,
            issued_dn: body.issued_dn.unwrap_or_default(),
            issuer_dn: body.issuer_dn.unwrap_or_default(),
            locations: body.locations.into_iter().map(|location| StoreId::new(location.store_id)).collect(),
        }
    }
}

// ============================================================================
// SECTION: Stores
// ============================================================================

/// Certificate store as returned by `CertificateStores` endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StoreBody {
    /// Store id.
    pub id: String,
    /// Store type id.
    #[serde(default)]
    pub cert_store_type: i64,
    /// Client machine.
    #[serde(default)]
    pub client_machine: String,
    /// Store path.
    #[serde(default)]
    pub store_path: String,
    /// Container id.
    #[serde(default)]
    pub container_id: Option<i64>,
    /// Container name.
    #[serde(default)]
    pub container_name: Option<String>,
    /// Orchestrator agent id.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Inventory schedule.
    #[serde(default)]
    pub inventory_schedule: Option<ScheduleBody>,
    /// Properties as an encoded JSON string or an object.
    #[serde(default)]
    pub properties: Option<Value>,
}

/// Inventory schedule of a store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ScheduleBody {
    /// Interval schedule, when scheduled by interval.
    #[serde(default)]
    pub interval: Option<IntervalBody>,
}

/// Interval schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct IntervalBody {
    /// Minutes between inventories.
    pub minutes: i64,
}

impl StoreBody {
    /// Converts the body into a store record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Protocol`] when the properties are malformed.
    pub fn into_record(self) -> Result<StoreRecord, GatewayError> {
        let properties = match self.properties {
            Some(value) => unwrap_properties(value)?,
            None => Map::new(),
        };
        Ok(StoreRecord {
            id: StoreId::new(self.id),
            store_type_id: self.cert_store_type,
            store_type: String::new(),
            client_machine: self.client_machine,
            store_path: self.store_path,
            container_id: self.container_id.filter(|id| *id != 0),
            container_name: self.container_name.unwrap_or_default(),
            agent_id: self.agent_id.unwrap_or_default(),
            inventory_interval_minutes: self
                .inventory_schedule
                .and_then(|schedule| schedule.interval)
                .map(|interval| interval.minutes),
            properties,
        })
    }
}

/// Decodes store properties and removes the `{"value": v}` wrapping.
///
/// # Errors
///
/// Returns [`GatewayError::Protocol`] when the encoded string is not a JSON object.
pub(crate) fn unwrap_properties(value: Value) -> Result<Map<String, Value>, GatewayError> {
    let object = match value {
        Value::Null => return Ok(Map::new()),
        Value::String(text) if text.trim().is_empty() => return Ok(Map::new()),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(object)) => object,
            _ => {
                return Err(GatewayError::Protocol("store properties are not a JSON object".to_string()));
            }
        },
        Value::Object(object) => object,
        _ => return Err(GatewayError::Protocol("store properties are not a JSON object".to_string())),
    };
    Ok(object
        .into_iter()
        .map(|(name, value)| {
            let plain = match value {
                Value::Object(mut wrapper) if wrapper.len() == 1 => {
                    match wrapper.remove("value").or_else(|| wrapper.remove("Value")) {
                        Some(inner) => inner,
                        None => Value::Object(wrapper),
                    }
                }
                other => other,
            };
            (name, plain)
        })
        .collect())
}

/// Builds the `POST CertificateStores` body for a bulk import row.
///
/// # Errors
///
/// Returns [`GatewayError::Protocol`] when the properties cannot be encoded.
pub(crate) fn create_store_body(request: &CreateStoreRequest) -> Result<Value, GatewayError> {
    let mut body = request.body.clone();
    let unset_container = body
        .get(CONTAINER_ID_KEY)
        .is_some_and(|value| value.is_null() || value.as_i64() == Some(0));
    if unset_container {
        body.remove(CONTAINER_ID_KEY);
    }
    body.insert(STORE_TYPE_KEY.to_string(), Value::from(request.store_type_id));
    if let Some(properties) = body.remove(PROPERTIES_KEY) {
        let wrapped: Map<String, Value> = match properties {
            Value::Object(object) => object
                .into_iter()
                .map(|(name, value)| {
                    let mut wrapper = Map::new();
                    wrapper.insert("value".to_string(), value);
                    (name, Value::Object(wrapper))
                })
                .collect(),
            _ => {
                return Err(GatewayError::Protocol("store properties must be an object".to_string()));
            }
        };
        let encoded = serde_json::to_string(&wrapped)
            .map_err(|err| GatewayError::Protocol(format!("encoding store properties: {err}")))?;
        body.insert(PROPERTIES_KEY.to_string(), Value::String(encoded));
    }
    if let Some(password) = body.remove(PASSWORD_KEY) {
        let wrapped = match password {
            Value::Object(object) => Value::Object(object),
            Value::String(secret) => {
                let mut wrapper = Map::new();
                wrapper.insert("Value".to_string(), Value::String(secret));
                Value::Object(wrapper)
            }
            other => {
                let mut wrapper = Map::new();
                wrapper.insert("Value".to_string(), Value::String(other.to_string()));
                Value::Object(wrapper)
            }
        };
        body.insert(PASSWORD_KEY.to_string(), wrapped);
    }
    Ok(Value::Object(body))
}

/// Response of `POST CertificateStores`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CreatedStoreBody {
    /// New store id.
    pub id: String,
}

// ============================================================================
// SECTION: Inventory
// ============================================================================

/// Inventory entry of a store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InventoryBody {
    /// Entry alias.
    #[serde(default)]
    pub name: String,
    /// Certificates under the alias.
    #[serde(default)]
    pub certificates: Vec<InventoryCertificateBody>,
    /// Entry parameters.
    #[serde(default)]
    pub parameters: Option<BTreeMap<String, Value>>,
}

/// Certificate inside an inventory entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InventoryCertificateBody {
    /// Platform certificate id.
    pub id: i64,
    /// Fingerprint.
    #[serde(default)]
    pub thumbprint: String,
    /// Serial number.
    #[serde(default)]
    pub serial_number: String,
    /// Subject distinguished name.
    #[serde(rename = "IssuedDN", default)]
    pub issued_dn: Option<String>,
    /// Issuer distinguished name.
    #[serde(rename = "IssuerDN", default)]
    pub issuer_dn: Option<String>,
}

impl From<InventoryBody> for InventoryEntry {
    fn from(body: InventoryBody) -> Self {
        Self {
            alias: body.name,
            certificates: body
                .certificates
                .into_iter()
                .map(|certificate| InventoryCertificate {
                    id: certificate.id,
                    thumbprint: normalize_thumbprint(&certificate.thumbprint),
                    serial_number: certificate.serial_number,
                    issued_dn: certificate.issued_dn.unwrap_or_default(),
                    issuer_dn: certificate.issuer_dn.unwrap_or_default(),
                })
                .collect(),
            parameters: body.parameters.unwrap_or_default(),
        }
    }
}

// ============================================================================
// SECTION: Store Types
// ============================================================================

/// Store type as returned by `CertificateStoreTypes` endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StoreTypeBody {
    /// Store type id.
    pub store_type: i64,
    /// Short name.
    pub short_name: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Declared properties.
    #[serde(default)]
    pub properties: Vec<StoreTypePropertyBody>,
    /// Password options.
    #[serde(default)]
    pub password_options: Option<PasswordOptionsBody>,
}

/// Declared property of a store type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StoreTypePropertyBody {
    /// Property name.
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Property type.
    #[serde(rename = "Type", default)]
    pub property_type: Option<String>,
    /// Whether the property is required.
    #[serde(default)]
    pub required: bool,
    /// Default value.
    #[serde(default)]
    pub default_value: Option<String>,
}

/// Password options of a store type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PasswordOptionsBody {
    /// Whether entry passwords are supported.
    #[serde(default)]
    pub entry_supported: bool,
    /// Whether the store password is required.
    #[serde(default)]
    pub store_required: bool,
    /// Password style.
    #[serde(default)]
    pub style: Option<String>,
}

impl From<StoreTypeBody> for StoreTypeDescriptor {
    fn from(body: StoreTypeBody) -> Self {
        let password_options = body
            .password_options
            .map(|options| PasswordOptions {
                entry_supported: options.entry_supported,
                store_required: options.store_required,
                style: options.style.unwrap_or_default(),
            })
            .unwrap_or_default();
        Self {
            id: body.store_type,
            short_name: body.short_name,
            name: body.name,
            properties: body
                .properties
                .into_iter()
                .map(|property| StoreTypeProperty {
                    name: property.name,
                    display_name: property.display_name.unwrap_or_default(),
                    property_type: property.property_type.unwrap_or_default(),
                    required: property.required,
                    default_value: property.default_value.unwrap_or_default(),
                })
                .collect(),
            password_options,
        }
    }
}

// ============================================================================
// SECTION: Jobs
// ============================================================================

/// Immediate schedule marker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ScheduleRequest {
    /// Always true.
    pub immediate: bool,
}

/// Store target of an add job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AddTarget {
    /// Target store id.
    pub certificate_store_id: String,
    /// Entry alias, when chosen by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Whether an existing entry may be replaced.
    pub overwrite: bool,
}

/// Body of `POST CertificateStores/Certificates/Add`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct AddRequest {
    /// Certificate id.
    pub certificate_id: i64,
    /// Target stores.
    pub certificate_stores: Vec<AddTarget>,
    /// Dispatch schedule.
    pub schedule: ScheduleRequest,
}

impl From<&CertificateStoreJob> for AddRequest {
    fn from(job: &CertificateStoreJob) -> Self {
        Self {
            certificate_id: job.cert_id,
            certificate_stores: job
                .targets
                .iter()
                .map(|target| AddTarget {
                    certificate_store_id: target.store_id.to_string(),
                    alias: target.alias.clone(),
                    overwrite: target.overwrite,
                })
                .collect(),
            schedule: ScheduleRequest {
                immediate: true,
            },
        }
    }
}

/// Store target of a remove job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RemoveTarget {
    /// Target store id.
    pub certificate_store_id: String,
    /// Entry alias to remove.
    pub alias: String,
    /// Certificate id.
    pub certificate_id: i64,
}

/// Body of `POST CertificateStores/Certificates/Remove`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RemoveRequest {
    /// Target stores.
    pub certificate_stores: Vec<RemoveTarget>,
    /// Dispatch schedule.
    pub schedule: ScheduleRequest,
}

impl From<&CertificateStoreJob> for RemoveRequest {
    fn from(job: &CertificateStoreJob) -> Self {
        Self {
            certificate_stores: job
                .targets
                .iter()
                .map(|target| RemoveTarget {
                    certificate_store_id: target.store_id.to_string(),
                    alias: target.alias.clone().unwrap_or_default(),
                    certificate_id: job.cert_id,
                })
                .collect(),
            schedule: ScheduleRequest {
                immediate: true,
            },
        }
    }
}

/// Extracts job ids from a job response; unknown shapes yield none.
pub(crate) fn job_ids(body: &[u8]) -> Vec<String> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(items)) => {
            items.into_iter().filter_map(|item| item.as_str().map(str::to_string)).collect()
        }
        Ok(Value::String(id)) => vec![id],
        _ => Vec::new(),
    }
}

/// Extracts the `Message` field of a Platform error body.
pub(crate) fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value.get("Message").and_then(Value::as_str).map(str::to_string)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
