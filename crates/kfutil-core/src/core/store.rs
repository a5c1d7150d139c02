// crates/kfutil-core/src/core/store.rs
// ============================================================================
// Module: Trust-Store Model
// Description: Candidate root-of-trust store and its last-known inventory.
// Purpose: Provide derived lookup indexes used by eligibility and planning.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`TrustStore`] is created per Stores CSV row, filled from Platform state,
//! and mutated only when its inventory is loaded. The four derived sets
//! (`thumbprints`, `serials`, `cert_ids`, `aliases`) are rebuilt from scratch
//! every time the inventory is replaced, so they are always a pure function of
//! the inventory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::StoreId;
use crate::core::identifiers::normalize_thumbprint;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Inventory parameter flagging an entry that carries a private key.
pub const PRIVATE_KEY_PARAMETER: &str = "PrivateKeyEntry";

// ============================================================================
// SECTION: Inventory
// ============================================================================

/// One certificate inside an inventory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCertificate {
    /// Platform certificate id.
    pub id: i64,
    /// Certificate fingerprint.
    pub thumbprint: String,
    /// Certificate serial number.
    pub serial_number: String,
    /// Subject distinguished name.
    pub issued_dn: String,
    /// Issuer distinguished name.
    pub issuer_dn: String,
}

impl InventoryCertificate {
    /// Returns true when subject and issuer differ.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.issued_dn != self.issuer_dn
    }
}

/// One logical keystore entry; chains carry several certificates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// Entry alias within the store.
    pub alias: String,
    /// Certificates stored under the alias.
    pub certificates: Vec<InventoryCertificate>,
    /// Opaque entry parameters reported by the orchestrator.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl InventoryEntry {
    /// Returns true when the entry reports `PrivateKeyEntry = Yes`.
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        match self.parameters.get(PRIVATE_KEY_PARAMETER) {
            Some(Value::String(flag)) => flag == "Yes",
            _ => false,
        }
    }
}

// ============================================================================
// SECTION: Trust Store
// ============================================================================

/// Candidate root-of-trust store.
///
/// # Invariants
/// - The derived sets are rebuilt whenever the inventory changes.
/// - `container_id` is `None` when the Platform reports zero or nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustStore {
    /// Platform store id.
    pub store_id: StoreId,
    /// Store type short name.
    pub store_type: String,
    /// Client machine hosting the store.
    pub client_machine: String,
    /// Store path on the client machine.
    pub store_path: String,
    /// Container id, absent when unset.
    pub container_id: Option<i64>,
    /// Container name.
    pub container_name: String,
    /// Last time the store row was refreshed, informational.
    pub last_queried: String,
    /// Loaded inventory.
    inventory: Vec<InventoryEntry>,
    /// Upper-case fingerprints found in the inventory.
    thumbprints: BTreeSet<String>,
    /// Serial numbers found in the inventory.
    serials: BTreeSet<String>,
    /// Platform certificate ids found in the inventory.
    cert_ids: BTreeSet<i64>,
    /// Aliases found in the inventory.
    aliases: BTreeSet<String>,
}

impl TrustStore {
    /// Creates an empty store for the given id.
    #[must_use]
    pub fn new(store_id: StoreId) -> Self {
        Self {
            store_id,
            ..Self::default()
        }
    }

    /// Replaces the inventory and rebuilds the derived sets.
    pub fn set_inventory(&mut self, inventory: Vec<InventoryEntry>) {
        self.thumbprints.clear();
        self.serials.clear();
        self.cert_ids.clear();
        self.aliases.clear();
        for entry in &inventory {
            self.aliases.insert(entry.alias.clone());
            for certificate in &entry.certificates {
                self.thumbprints.insert(normalize_thumbprint(&certificate.thumbprint));
                self.serials.insert(certificate.serial_number.clone());
                self.cert_ids.insert(certificate.id);
            }
        }
        self.inventory = inventory;
    }

    /// Returns the loaded inventory.
    #[must_use]
    pub fn inventory(&self) -> &[InventoryEntry] {
        &self.inventory
    }

    /// Returns the fingerprint index.
    #[must_use]
    pub const fn thumbprints(&self) -> &BTreeSet<String> {
        &self.thumbprints
    }

    /// Returns the serial number index.
    #[must_use]
    pub const fn serials(&self) -> &BTreeSet<String> {
        &self.serials
    }

    /// Returns the certificate id index.
    #[must_use]
    pub const fn cert_ids(&self) -> &BTreeSet<i64> {
        &self.cert_ids
    }

    /// Returns the alias index.
    #[must_use]
    pub const fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    /// Returns true when the inventory contains the fingerprint.
    #[must_use]
    pub fn contains_thumbprint(&self, thumbprint: &str) -> bool {
        self.thumbprints.contains(&normalize_thumbprint(thumbprint))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
