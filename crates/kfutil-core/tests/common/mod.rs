// crates/kfutil-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared builders for certificates, stores, and input files.
// Purpose: Keep scenario tests focused on the behavior under test.
// Dependencies: kfutil-core, tempfile, time
// ============================================================================

//! ## Overview
//! Fixtures build deterministic Platform contents for the in-memory gateway
//! and write root-of-trust input CSVs into temporary directories.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use kfutil_core::CertificateRecord;
use kfutil_core::FixedClock;
use kfutil_core::InMemoryPlatform;
use kfutil_core::InventoryCertificate;
use kfutil_core::InventoryEntry;
use kfutil_core::RunConfig;
use kfutil_core::StoreId;
use kfutil_core::StoreRecord;
use kfutil_core::StoreTypeDescriptor;
use kfutil_core::core::store::PRIVATE_KEY_PARAMETER;
use kfutil_core::csv::audit::AUDIT_HEADER;
use kfutil_core::csv::stores::STORES_HEADER;
use serde_json::Value;
use time::OffsetDateTime;
use time::macros::datetime;

// ============================================================================
// SECTION: Identities
// ============================================================================

/// Fixed planning instant.
pub const NOW: OffsetDateTime = datetime!(2026-03-01 12:00:00 UTC);

/// Returns a 40-character fingerprint made of one repeated hex digit.
#[must_use]
pub fn fp(digit: char) -> String {
    digit.to_ascii_uppercase().to_string().repeat(40)
}

/// Returns a distinct fingerprint for an index.
#[must_use]
pub fn indexed_fp(index: u64) -> String {
    format!("{index:040X}")
}

/// Returns a self-signed certificate record.
#[must_use]
pub fn root_record(id: i64, thumbprint: &str) -> CertificateRecord {
    CertificateRecord {
        id,
        thumbprint: thumbprint.to_string(),
        serial_number: format!("SN{id}"),
        issued_dn: format!("CN=Root {id}, O=Example"),
        issuer_dn: format!("CN=Root {id}, O=Example"),
        locations: Vec::new(),
    }
}

/// Returns the inventory form of a certificate record.
#[must_use]
pub fn inventory_certificate(record: &CertificateRecord) -> InventoryCertificate {
    InventoryCertificate {
        id: record.id,
        thumbprint: record.thumbprint.clone(),
        serial_number: record.serial_number.clone(),
        issued_dn: record.issued_dn.clone(),
        issuer_dn: record.issuer_dn.clone(),
    }
}

/// Returns an inventory entry holding one certificate under its fingerprint.
#[must_use]
pub fn entry_for(record: &CertificateRecord) -> InventoryEntry {
    InventoryEntry {
        alias: record.thumbprint.clone(),
        certificates: vec![inventory_certificate(record)],
        parameters: BTreeMap::new(),
    }
}

/// Returns `count` self-signed entries with distinct fingerprints.
#[must_use]
pub fn root_entries(count: u64, first_id: i64) -> Vec<InventoryEntry> {
    (0 .. count)
        .map(|offset| {
            let id = first_id + i64::try_from(offset).unwrap();
            entry_for(&root_record(id, &indexed_fp(1_000_000 + offset)))
        })
        .collect()
}

/// Returns `count` leaf entries issued by an intermediate.
#[must_use]
pub fn leaf_entries(count: u64, first_id: i64, with_key: bool) -> Vec<InventoryEntry> {
    (0 .. count)
        .map(|offset| {
            let id = first_id + i64::try_from(offset).unwrap();
            let mut parameters = BTreeMap::new();
            if with_key {
                parameters.insert(PRIVATE_KEY_PARAMETER.to_string(), Value::from("Yes"));
            }
            InventoryEntry {
                alias: format!("leaf-{id}"),
                certificates: vec![InventoryCertificate {
                    id,
                    thumbprint: indexed_fp(2_000_000 + offset),
                    serial_number: format!("LSN{id}"),
                    issued_dn: format!("CN=host{id}.example.com"),
                    issuer_dn: "CN=Issuing CA".to_string(),
                }],
                parameters,
            }
        })
        .collect()
}

// ============================================================================
// SECTION: Stores
// ============================================================================

/// Returns a PEM store record.
#[must_use]
pub fn store_record(id: &str) -> StoreRecord {
    StoreRecord {
        id: StoreId::new(id),
        store_type_id: 105,
        store_type: "PEM".to_string(),
        client_machine: format!("{id}.example.com"),
        store_path: "/etc/ssl/certs/ca.pem".to_string(),
        container_id: Some(0),
        ..StoreRecord::default()
    }
}

/// Returns a PEM store type descriptor.
#[must_use]
pub fn pem_store_type() -> StoreTypeDescriptor {
    StoreTypeDescriptor {
        id: 105,
        short_name: "PEM".to_string(),
        name: "PEM File".to_string(),
        properties: Vec::new(),
        password_options: kfutil_core::PasswordOptions::default(),
    }
}

/// Returns a platform with the standard certificates `A`..`D` registered
/// except `D`, which is unknown to the Platform.
#[must_use]
pub fn platform() -> InMemoryPlatform {
    InMemoryPlatform::new()
        .with_store_type(pem_store_type())
        .with_certificate(root_record(1, &fp('a')))
        .with_certificate(root_record(2, &fp('b')))
        .with_certificate(root_record(3, &fp('c')))
}

// ============================================================================
// SECTION: Input Files
// ============================================================================

/// Writes a file and returns its path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Returns Stores CSV text listing the ids.
#[must_use]
pub fn stores_csv(ids: &[&str]) -> String {
    let mut text = STORES_HEADER.join(",");
    text.push('\n');
    for id in ids {
        text.push_str(&format!("{id},,,,,,\n"));
    }
    text
}

/// Returns Certificates CSV text listing the references.
#[must_use]
pub fn certs_csv<S: AsRef<str>>(references: &[S]) -> String {
    let mut text = String::from("Thumbprint,SubjectName,Issuer,CertID,Locations,LastQueriedDate\n");
    for reference in references {
        text.push_str(&format!("{},,,,,\n", reference.as_ref()));
    }
    text
}

/// Returns the audit header line.
#[must_use]
pub fn audit_header() -> String {
    AUDIT_HEADER.join(",")
}

/// Builds a run config in `dir` with a fixed clock.
#[must_use]
pub fn run_config<S: AsRef<str>>(
    dir: &Path,
    stores: &[&str],
    add: Option<&[S]>,
    remove: Option<&[S]>,
) -> RunConfig {
    RunConfig {
        stores_path: Some(write_file(dir, "stores.csv", &stores_csv(stores))),
        add_certs_path: add.map(|refs| write_file(dir, "add.csv", &certs_csv(refs))),
        remove_certs_path: remove.map(|refs| write_file(dir, "remove.csv", &certs_csv(refs))),
        audit_path: dir.join("rot_audit.csv"),
        clock: Arc::new(FixedClock(NOW)),
        ..RunConfig::default()
    }
}
