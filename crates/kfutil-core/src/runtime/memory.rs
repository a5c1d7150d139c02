// crates/kfutil-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Platform
// Description: Deterministic gateway backed by in-process maps.
// Purpose: Drive the pipeline in tests without a Platform instance.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryPlatform`] implements [`PlatformGateway`] over maps guarded by a
//! mutex. Add and remove jobs are applied to the stored inventories at once,
//! so a second audit observes the converged state. Every call is recorded and
//! failures can be injected per call site. It is not intended for production
//! use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::identifiers::CertificateRef;
use crate::core::identifiers::StoreId;
use crate::core::identifiers::StoreTypeRef;
use crate::core::identifiers::normalize_thumbprint;
use crate::core::store::InventoryCertificate;
use crate::core::store::InventoryEntry;
use crate::interfaces::CertificateQuery;
use crate::interfaces::CertificateRecord;
use crate::interfaces::CertificateStoreJob;
use crate::interfaces::CreateStoreRequest;
use crate::interfaces::GatewayError;
use crate::interfaces::JobReceipt;
use crate::interfaces::PlatformGateway;
use crate::interfaces::StoreFilter;
use crate::interfaces::StoreRecord;
use crate::interfaces::StoreTypeDescriptor;

// ============================================================================
// SECTION: Calls and Failures
// ============================================================================

/// Recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `lookup_certificate`.
    LookupCertificate(String),
    /// `query_certificates`.
    QueryCertificates,
    /// `list_stores`.
    ListStores,
    /// `get_store`.
    GetStore(StoreId),
    /// `get_store_inventory`.
    GetStoreInventory(StoreId),
    /// `get_store_type`.
    GetStoreType(String),
    /// `add_certificate_to_stores`.
    Add {
        /// Certificate id.
        cert_id: i64,
        /// Target store.
        store_id: StoreId,
        /// Overwrite flag.
        overwrite: bool,
    },
    /// `remove_certificate_from_stores`.
    Remove {
        /// Certificate id.
        cert_id: i64,
        /// Target store.
        store_id: StoreId,
        /// Entry alias.
        alias: String,
    },
    /// `create_store`.
    CreateStore(i64),
}

impl GatewayCall {
    /// Returns true for calls that mutate Platform state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Add { .. } | Self::Remove { .. } | Self::CreateStore(_))
    }
}

/// Call site a failure can be injected at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailurePoint {
    /// Lookup of a reference, keyed by its display form.
    Lookup(String),
    /// Fetch of a store.
    GetStore(StoreId),
    /// Fetch of a store inventory.
    Inventory(StoreId),
    /// Add job targeting a store.
    Add(StoreId),
    /// Remove job targeting a store.
    Remove(StoreId),
    /// Store creation for a client machine.
    CreateStore(String),
    /// Any store listing.
    ListStores,
}

/// Injected failure with an optional remaining count.
#[derive(Debug, Clone)]
struct Failure {
    /// Error returned.
    error: GatewayError,
    /// Times left to fail; `None` fails forever.
    remaining: Option<u32>,
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Mutable platform contents.
#[derive(Debug, Default)]
struct PlatformState {
    /// Known certificates.
    certificates: Vec<CertificateRecord>,
    /// Collection id to member certificate ids.
    collections: BTreeMap<i64, Vec<i64>>,
    /// Stores in insertion order.
    stores: Vec<StoreRecord>,
    /// Inventories by store id.
    inventories: BTreeMap<StoreId, Vec<InventoryEntry>>,
    /// Store types.
    store_types: Vec<StoreTypeDescriptor>,
    /// Created store bodies by new id.
    created: BTreeMap<StoreId, CreateStoreRequest>,
    /// Injected failures.
    failures: BTreeMap<FailurePoint, Failure>,
    /// Call log.
    calls: Vec<GatewayCall>,
}

impl PlatformState {
    /// Returns and consumes an injected failure.
    fn take_failure(&mut self, point: &FailurePoint) -> Result<(), GatewayError> {
        let Some(failure) = self.failures.get_mut(point) else {
            return Ok(());
        };
        let error = failure.error.clone();
        match failure.remaining {
            None => {}
            Some(0) => return Ok(()),
            Some(count) => failure.remaining = Some(count - 1),
        }
        Err(error)
    }

    /// Finds a certificate by reference.
    fn find_certificate(&self, reference: &CertificateRef) -> Option<&CertificateRecord> {
        match reference {
            CertificateRef::Thumbprint(thumbprint) => self
                .certificates
                .iter()
                .find(|record| normalize_thumbprint(&record.thumbprint) == thumbprint.as_str()),
            CertificateRef::Id(id) => self.certificates.iter().find(|record| record.id == *id),
        }
    }

    /// Returns the store ids whose inventory holds a fingerprint.
    fn locations(&self, thumbprint: &str) -> Vec<StoreId> {
        let wanted = normalize_thumbprint(thumbprint);
        self.inventories
            .iter()
            .filter(|(_, entries)| {
                entries.iter().any(|entry| {
                    entry
                        .certificates
                        .iter()
                        .any(|certificate| normalize_thumbprint(&certificate.thumbprint) == wanted)
                })
            })
            .map(|(store_id, _)| store_id.clone())
            .collect()
    }
}

// ============================================================================
// SECTION: In-Memory Platform
// ============================================================================

/// In-memory gateway for tests and local exploration.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlatform {
    /// Shared state protected by a mutex.
    state: Arc<Mutex<PlatformState>>,
}

impl InMemoryPlatform {
    /// Creates an empty platform.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state.
    fn lock(&self) -> Result<MutexGuard<'_, PlatformState>, GatewayError> {
        self.state
            .lock()
            .map_err(|_| GatewayError::Transport("in-memory platform mutex poisoned".to_string()))
    }

    /// Applies a builder mutation, ignoring a poisoned lock.
    fn update(&self, apply: impl FnOnce(&mut PlatformState)) {
        if let Ok(mut state) = self.state.lock() {
            apply(&mut state);
        }
    }

    /// Adds a certificate.
    #[must_use]
    pub fn with_certificate(self, record: CertificateRecord) -> Self {
        self.update(|state| state.certificates.push(record));
        self
    }

    /// Adds a collection of certificate ids.
    #[must_use]
    pub fn with_collection(self, collection_id: i64, cert_ids: Vec<i64>) -> Self {
        self.update(|state| {
            state.collections.insert(collection_id, cert_ids);
        });
        self
    }

    /// Adds a store and its inventory.
    #[must_use]
    pub fn with_store(self, record: StoreRecord, inventory: Vec<InventoryEntry>) -> Self {
        self.update(|state| {
            state.inventories.insert(record.id.clone(), inventory);
            state.stores.push(record);
        });
        self
    }

    /// Adds a store type.
    #[must_use]
    pub fn with_store_type(self, descriptor: StoreTypeDescriptor) -> Self {
        self.update(|state| state.store_types.push(descriptor));
        self
    }

    /// Fails every call at `point` with `error`.
    #[must_use]
    pub fn failing(self, point: FailurePoint, error: GatewayError) -> Self {
        self.update(|state| {
            state.failures.insert(point, Failure {
                error,
                remaining: None,
            });
        });
        self
    }

    /// Fails the next `times` calls at `point` with `error`.
    #[must_use]
    pub fn failing_times(self, point: FailurePoint, error: GatewayError, times: u32) -> Self {
        self.update(|state| {
            state.failures.insert(point, Failure {
                error,
                remaining: Some(times),
            });
        });
        self
    }

    /// Returns the call log.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().map(|state| state.calls.clone()).unwrap_or_default()
    }

    /// Returns only mutating calls.
    #[must_use]
    pub fn mutations(&self) -> Vec<GatewayCall> {
        self.calls().into_iter().filter(GatewayCall::is_mutation).collect()
    }

    /// Clears the call log.
    pub fn clear_calls(&self) {
        self.update(|state| state.calls.clear());
    }

    /// Returns the current inventory of a store.
    #[must_use]
    pub fn inventory(&self, store_id: &StoreId) -> Vec<InventoryEntry> {
        self.lock().ok().and_then(|state| state.inventories.get(store_id).cloned()).unwrap_or_default()
    }

    /// Returns the request that created a store.
    #[must_use]
    pub fn created_store(&self, store_id: &StoreId) -> Option<CreateStoreRequest> {
        self.lock().ok().and_then(|state| state.created.get(store_id).cloned())
    }
}

impl PlatformGateway for InMemoryPlatform {
    fn lookup_certificate(
        &self,
        reference: &CertificateRef,
    ) -> Result<CertificateRecord, GatewayError> {
        let mut state = self.lock()?;
        state.calls.push(GatewayCall::LookupCertificate(reference.to_string()));
        state.take_failure(&FailurePoint::Lookup(reference.to_string()))?;
        let mut record = state
            .find_certificate(reference)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("certificate {reference}")))?;
        record.locations = state.locations(&record.thumbprint);
        Ok(record)
    }

    fn query_certificates(
        &self,
        query: &CertificateQuery,
    ) -> Result<Vec<CertificateRecord>, GatewayError> {
        let mut state = self.lock()?;
        state.calls.push(GatewayCall::QueryCertificates);
        let members = match query.collection_id {
            Some(id) => Some(
                state
                    .collections
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| GatewayError::NotFound(format!("collection {id}")))?,
            ),
            None => None,
        };
        let records = state
            .certificates
            .iter()
            .filter(|record| members.as_ref().is_none_or(|ids| ids.contains(&record.id)))
            .filter(|record| {
                query.common_names.is_empty()
                    || query
                        .common_names
                        .iter()
                        .any(|name| record.issued_dn.contains(&format!("CN={name}")))
            })
            .cloned()
            .map(|mut record| {
                record.locations = state.locations(&record.thumbprint);
                record
            })
            .collect();
        Ok(records)
    }

    fn list_stores(&self, filter: &StoreFilter) -> Result<Vec<StoreRecord>, GatewayError> {
        let mut state = self.lock()?;
        state.calls.push(GatewayCall::ListStores);
        state.take_failure(&FailurePoint::ListStores)?;
        Ok(state.stores.iter().filter(|record| filter.matches(record)).cloned().collect())
    }

    fn get_store(&self, store_id: &StoreId) -> Result<StoreRecord, GatewayError> {
        let mut state = self.lock()?;
        state.calls.push(GatewayCall::GetStore(store_id.clone()));
        state.take_failure(&FailurePoint::GetStore(store_id.clone()))?;
        state
            .stores
            .iter()
            .find(|record| &record.id == store_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("store {store_id}")))
    }

    fn get_store_inventory(&self, store_id: &StoreId) -> Result<Vec<InventoryEntry>, GatewayError> {
        let mut state = self.lock()?;
        state.calls.push(GatewayCall::GetStoreInventory(store_id.clone()));
        state.take_failure(&FailurePoint::Inventory(store_id.clone()))?;
        Ok(state.inventories.get(store_id).cloned().unwrap_or_default())
    }

    fn get_store_type(
        &self,
        reference: &StoreTypeRef,
    ) -> Result<StoreTypeDescriptor, GatewayError> {
        let mut state = self.lock()?;
        state.calls.push(GatewayCall::GetStoreType(reference.to_string()));
        state
            .store_types
            .iter()
            .find(|descriptor| match reference {
                StoreTypeRef::Id(id) => descriptor.id == *id,
                StoreTypeRef::Name(name) => descriptor.short_name.eq_ignore_ascii_case(name),
            })
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("store type {reference}")))
    }

    fn add_certificate_to_stores(
        &self,
        job: &CertificateStoreJob,
    ) -> Result<JobReceipt, GatewayError> {
        let mut state = self.lock()?;
        let certificate = state
            .find_certificate(&CertificateRef::Id(job.cert_id))
            .cloned()
            .ok_or_else(|| GatewayError::Validation(format!("unknown certificate {}", job.cert_id)));
        let mut receipt = JobReceipt::default();
        for target in &job.targets {
            state.calls.push(GatewayCall::Add {
                cert_id: job.cert_id,
                store_id: target.store_id.clone(),
                overwrite: target.overwrite,
            });
            state.take_failure(&FailurePoint::Add(target.store_id.clone()))?;
            let certificate = certificate.clone()?;
            let thumbprint = normalize_thumbprint(&certificate.thumbprint);
            let alias = target.alias.clone().unwrap_or_else(|| thumbprint.clone());
            let entries = state.inventories.entry(target.store_id.clone()).or_default();
            entries.retain(|entry| entry.alias != alias);
            entries.push(InventoryEntry {
                alias,
                certificates: vec![InventoryCertificate {
                    id: certificate.id,
                    thumbprint,
                    serial_number: certificate.serial_number,
                    issued_dn: certificate.issued_dn,
                    issuer_dn: certificate.issuer_dn,
                }],
                parameters: BTreeMap::new(),
            });
            receipt.job_ids.push(format!("add-{}-{}", job.cert_id, target.store_id));
        }
        Ok(receipt)
    }

    fn remove_certificate_from_stores(
        &self,
        job: &CertificateStoreJob,
    ) -> Result<JobReceipt, GatewayError> {
        let mut state = self.lock()?;
        let mut receipt = JobReceipt::default();
        for target in &job.targets {
            let alias = target.alias.clone().unwrap_or_default();
            state.calls.push(GatewayCall::Remove {
                cert_id: job.cert_id,
                store_id: target.store_id.clone(),
                alias: alias.clone(),
            });
            state.take_failure(&FailurePoint::Remove(target.store_id.clone()))?;
            if alias.is_empty() {
                return Err(GatewayError::Validation("remove requires an alias".to_string()));
            }
            let wanted = normalize_thumbprint(&alias);
            if let Some(entries) = state.inventories.get_mut(&target.store_id) {
                entries.retain(|entry| {
                    entry.alias != alias
                        && !entry
                            .certificates
                            .iter()
                            .any(|certificate| normalize_thumbprint(&certificate.thumbprint) == wanted)
                });
            }
            receipt.job_ids.push(format!("remove-{}-{}", job.cert_id, target.store_id));
        }
        Ok(receipt)
    }

    fn create_store(&self, request: &CreateStoreRequest) -> Result<StoreId, GatewayError> {
        let mut state = self.lock()?;
        state.calls.push(GatewayCall::CreateStore(request.store_type_id));
        let machine = request
            .body
            .get("ClientMachine")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        state.take_failure(&FailurePoint::CreateStore(machine.clone()))?;
        if machine.is_empty() {
            return Err(GatewayError::Validation("ClientMachine is required".to_string()));
        }
        let store_id = StoreId::new(format!("store-{}", state.created.len() + 1));
        state.created.insert(store_id.clone(), request.clone());
        state.stores.push(StoreRecord {
            id: store_id.clone(),
            store_type_id: request.store_type_id,
            client_machine: machine,
            store_path: request
                .body
                .get("StorePath")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
            ..StoreRecord::default()
        });
        Ok(store_id)
    }
}
