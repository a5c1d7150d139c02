// crates/kfutil-core/tests/bulk.rs
// ============================================================================
// Module: Bulk Store Tests
// Description: Template, import, and export of bulk store CSVs.
// Purpose: Validate credential precedence and result artifacts end to end.
// ============================================================================

//! Bulk store operations against the in-memory platform.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use common::write_file;
use kfutil_core::ErrorKind;
use kfutil_core::ImportOptions;
use kfutil_core::InMemoryPlatform;
use kfutil_core::NoPrompt;
use kfutil_core::PasswordOptions;
use kfutil_core::SecretPrompt;
use kfutil_core::SecretValues;
use kfutil_core::StoreId;
use kfutil_core::StoreRecord;
use kfutil_core::StoreTypeDescriptor;
use kfutil_core::StoreTypeProperty;
use kfutil_core::StoreTypeRef;
use kfutil_core::csv::read_table;
use kfutil_core::runtime::GatewayCall;
use kfutil_core::runtime::bulk::bulk_template;
use kfutil_core::runtime::bulk::export_stores;
use kfutil_core::runtime::bulk::import_stores;
use kfutil_core::runtime::bulk::results_path_for;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Prompt that answers every label with a fixed value and counts calls.
struct CountingPrompt {
    answer: Option<String>,
    asked: Vec<String>,
}

impl SecretPrompt for CountingPrompt {
    fn prompt_secret(&mut self, label: &str) -> Option<String> {
        self.asked.push(label.to_string());
        self.answer.clone()
    }
}

fn property(name: &str, property_type: &str, required: bool) -> StoreTypeProperty {
    StoreTypeProperty {
        name: name.to_string(),
        display_name: name.to_string(),
        property_type: property_type.to_string(),
        required,
        default_value: String::new(),
    }
}

fn k8s_store_type() -> StoreTypeDescriptor {
    StoreTypeDescriptor {
        id: 200,
        short_name: "K8SCert".to_string(),
        name: "Kubernetes Certificate".to_string(),
        properties: vec![
            property("ServerUsername", "Secret", true),
            property("ServerPassword", "Secret", true),
            property("KubeNamespace", "String", false),
        ],
        password_options: PasswordOptions {
            entry_supported: false,
            store_required: true,
            style: "Default".to_string(),
        },
    }
}

fn k8s_platform() -> InMemoryPlatform {
    InMemoryPlatform::new().with_store_type(k8s_store_type()).with_store_type(common::pem_store_type())
}

const K8S_HEADER: &str = "ContainerId,ClientMachine,StorePath,CreateIfMissing,AgentId,\
InventorySchedule.Interval.Minutes,Properties.ServerUsername,Properties.ServerPassword,\
Properties.KubeNamespace,Password";

fn created_body(platform: &InMemoryPlatform, id: &str) -> Map<String, Value> {
    platform.created_store(&StoreId::new(id)).unwrap().body
}

// ============================================================================
// SECTION: Template
// ============================================================================

#[test]
fn template_header_follows_store_type_properties() {
    let platform = k8s_platform();
    let (descriptor, template) =
        bulk_template(&platform, &StoreTypeRef::Name("k8scert".to_string())).unwrap();
    assert_eq!(descriptor.id, 200);
    assert_eq!(template.header.join(","), K8S_HEADER);
    assert!(template.rows.is_empty());
}

#[test]
fn unknown_store_type_is_a_lookup_error() {
    let platform = k8s_platform();
    let err = bulk_template(&platform, &StoreTypeRef::Id(999)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Lookup);
}

// ============================================================================
// SECTION: Import
// ============================================================================

#[test]
fn import_fills_credentials_by_precedence_and_writes_results() {
    let dir = TempDir::new().unwrap();
    let platform = k8s_platform();
    let input = write_file(
        dir.path(),
        "stores.csv",
        &format!(
            "{K8S_HEADER}\n\
             0,m1.example.com,ns1/secret,true,,60,row-user,,default,\n\
             5,m2.example.com,ns2/secret,false,agent-1,,,,,row-pass\n\
             ,,ns3/secret,false,,,,,,\n"
        ),
    );
    let results = results_path_for(&input);
    let options = ImportOptions {
        flags: SecretValues {
            server_password: Some("flag-pass".to_string()),
            ..SecretValues::default()
        },
        env: SecretValues {
            server_username: Some("env-user".to_string()),
            server_password: Some("env-pass".to_string()),
            store_password: None,
        },
    };
    let mut prompt = CountingPrompt {
        answer: Some("prompted".to_string()),
        asked: Vec::new(),
    };

    let report = import_stores(
        &platform,
        &StoreTypeRef::Name("K8SCert".to_string()),
        &input,
        &results,
        &options,
        &mut prompt,
    )
    .unwrap();

    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.count(ErrorKind::Apply), 1);
    assert_eq!(prompt.asked, vec!["store password".to_string()]);

    let first = created_body(&platform, "store-1");
    assert!(!first.contains_key("ContainerId"));
    assert_eq!(first["ClientMachine"], json!("m1.example.com"));
    assert_eq!(first["CreateIfMissing"], json!(true));
    assert_eq!(first["InventorySchedule"]["Interval"]["Minutes"], json!(60));
    assert_eq!(first["Properties"]["ServerUsername"], json!("row-user"));
    assert_eq!(first["Properties"]["ServerPassword"], json!("flag-pass"));
    assert_eq!(first["Properties"]["KubeNamespace"], json!("default"));
    assert_eq!(first["Password"], json!("prompted"));

    let second = created_body(&platform, "store-2");
    assert_eq!(second["ContainerId"], json!(5));
    assert_eq!(second["AgentId"], json!("agent-1"));
    assert_eq!(second["Properties"]["ServerUsername"], json!("env-user"));
    assert_eq!(second["Password"], json!("row-pass"));

    let table = read_table(&results).unwrap();
    assert_eq!(table.header.last().map(String::as_str), Some("StoreId"));
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.rows[0].get(11), "store-1");
    assert_eq!(table.rows[1].get(11), "store-2");
    assert!(table.rows[2].get(10).contains("ClientMachine is required"));
    assert_eq!(table.rows[2].get(11), "");
}

#[test]
fn missing_required_credential_fails_row_without_create() {
    let dir = TempDir::new().unwrap();
    let platform = k8s_platform();
    let input = write_file(
        dir.path(),
        "stores.csv",
        &format!("{K8S_HEADER}\n,m1.example.com,ns1/secret,false,,,,,,\n"),
    );
    let results = dir.path().join("results.csv");

    let report = import_stores(
        &platform,
        &StoreTypeRef::Id(200),
        &input,
        &results,
        &ImportOptions::default(),
        &mut NoPrompt,
    )
    .unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.failed, 1);
    assert!(report.errors.to_string().contains("missing required server username"));
    assert!(!platform.calls().iter().any(|call| matches!(call, GatewayCall::CreateStore(_))));
}

#[test]
fn duplicate_columns_are_rejected_before_any_call() {
    let dir = TempDir::new().unwrap();
    let platform = k8s_platform();
    let input = write_file(dir.path(), "stores.csv", "ClientMachine,StorePath,ClientMachine\na,b,c\n");
    let results = dir.path().join("results.csv");

    let err = import_stores(
        &platform,
        &StoreTypeRef::Id(200),
        &input,
        &results,
        &ImportOptions::default(),
        &mut NoPrompt,
    )
    .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Input);
    assert!(platform.calls().is_empty());
    assert!(!results.exists());
}

#[test]
fn results_path_sits_next_to_input() {
    let path = results_path_for(std::path::Path::new("/tmp/bulk/k8s.csv"));
    assert_eq!(path, std::path::PathBuf::from("/tmp/bulk/k8s_results.csv"));
}

// ============================================================================
// SECTION: Export
// ============================================================================

#[test]
fn export_blanks_credentials_and_appends_store_id() {
    let dir = TempDir::new().unwrap();
    let mut properties = Map::new();
    properties.insert("ServerUsername".to_string(), json!("admin"));
    properties.insert("ServerPassword".to_string(), json!("hunter2"));
    properties.insert("KubeNamespace".to_string(), json!("prod"));
    let platform = k8s_platform()
        .with_store(
            StoreRecord {
                id: StoreId::new("k8s-1"),
                store_type_id: 200,
                client_machine: "cluster.example.com".to_string(),
                store_path: "prod/tls".to_string(),
                container_id: Some(0),
                agent_id: "agent-7".to_string(),
                inventory_interval_minutes: Some(15),
                properties,
                ..StoreRecord::default()
            },
            Vec::new(),
        )
        .with_store(common::store_record("pem-1"), Vec::new());
    let output = dir.path().join("export.csv");

    let report = export_stores(&platform, &StoreTypeRef::Name("K8SCert".to_string()), &output).unwrap();

    assert_eq!(report.rows, 1);
    assert!(report.errors.is_empty());
    let text = std::fs::read_to_string(&output).unwrap();
    assert!(!text.contains("hunter2"));
    assert!(!text.contains("admin"));
    let table = read_table(&output).unwrap();
    assert_eq!(table.header.join(","), format!("{K8S_HEADER},StoreId"));
    let row = &table.rows[0];
    assert_eq!(row.get(0), "");
    assert_eq!(row.get(1), "cluster.example.com");
    assert_eq!(row.get(4), "agent-7");
    assert_eq!(row.get(5), "15");
    assert_eq!(row.get(6), "");
    assert_eq!(row.get(7), "");
    assert_eq!(row.get(8), "prod");
    assert_eq!(row.get(9), "");
    assert_eq!(row.get(10), "k8s-1");
}
