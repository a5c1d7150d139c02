// crates/kfutil-gateway/tests/http_gateway.rs
// ============================================================================
// Module: HTTP Gateway Tests
// Description: Exercise the REST gateway against a local stub Platform.
// Purpose: Pin request shapes, header handling, and status mapping.
// Dependencies: kfutil-gateway, kfutil-core, tiny_http
// ============================================================================

//! ## Overview
//! Every test starts a [`common::StubPlatform`] on a loopback port, drives one
//! gateway operation, and asserts on both the decoded result and the request
//! the stub recorded.

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

use common::StubPlatform;
use common::fp;
use kfutil_core::CertificateQuery;
use kfutil_core::CertificateRef;
use kfutil_core::CertificateStoreJob;
use kfutil_core::CreateStoreRequest;
use kfutil_core::GatewayError;
use kfutil_core::PlatformGateway;
use kfutil_core::StoreFilter;
use kfutil_core::StoreId;
use kfutil_core::StoreTypeRef;
use kfutil_gateway::HttpPlatform;
use kfutil_gateway::PlatformAuth;
use serde_json::json;

// ============================================================================
// SECTION: Certificates
// ============================================================================

#[test]
fn thumbprint_lookup_sends_query_headers_and_basic_auth() {
    let stub = StubPlatform::fixed(
        200,
        r#"[{"Id":12,"Thumbprint":"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa","SerialNumber":"01",
            "IssuedDN":"CN=Root","IssuerDN":"CN=Root","Locations":[{"StoreId":"s-1"},{"StoreId":"s-2"}]}]"#,
    );
    let reference = CertificateRef::parse(&fp('a')).unwrap();
    let record = stub.gateway().lookup_certificate(&reference).unwrap();

    assert_eq!(record.id, 12);
    assert_eq!(record.thumbprint, fp('A'));
    assert_eq!(record.issued_dn, "CN=Root");
    assert_eq!(record.locations, vec![StoreId::new("s-1"), StoreId::new("s-2")]);

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/KeyfactorAPI/Certificates");
    assert_eq!(
        request.query_value("pq.queryString"),
        Some(format!("Thumbprint -eq \"{}\"", fp('A')).as_str())
    );
    assert_eq!(request.query_value("includeLocations"), Some("true"));
    assert_eq!(request.header("x-keyfactor-requested-with"), Some("APIClient"));
    assert_eq!(request.header("x-keyfactor-api-version"), Some("1"));
    assert_eq!(request.header("authorization"), Some("Basic Q09SUFxzdmM6cHc="));
    assert!(request.header("user-agent").unwrap().starts_with("kfutil/"));
}

#[test]
fn bearer_token_is_sent_when_configured() {
    let stub = StubPlatform::fixed(200, r#"{"Id":5,"Thumbprint":"","SerialNumber":""}"#);
    let mut config = stub.config();
    config.auth = PlatformAuth::Bearer("tok-1".to_string());
    let gateway = HttpPlatform::new(config).unwrap();
    gateway.lookup_certificate(&CertificateRef::Id(5)).unwrap();
    let request = &stub.requests()[0];
    assert_eq!(request.path, "/KeyfactorAPI/Certificates/5");
    assert_eq!(request.header("authorization"), Some("Bearer tok-1"));
}

#[test]
fn empty_thumbprint_result_is_not_found() {
    let stub = StubPlatform::fixed(200, "[]");
    let reference = CertificateRef::parse(&fp('b')).unwrap();
    let err = stub.gateway().lookup_certificate(&reference).unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[test]
fn duplicate_thumbprint_matches_use_the_first() {
    let stub = StubPlatform::fixed(
        200,
        r#"[{"Id":1,"Thumbprint":"CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC"},
            {"Id":2,"Thumbprint":"CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC"}]"#,
    );
    let reference = CertificateRef::parse(&fp('c')).unwrap();
    assert_eq!(stub.gateway().lookup_certificate(&reference).unwrap().id, 1);
}

#[test]
fn missing_certificate_id_maps_to_not_found_with_platform_message() {
    let stub = StubPlatform::fixed(404, r#"{"Message":"Certificate 9 was not found"}"#);
    let err = stub.gateway().lookup_certificate(&CertificateRef::Id(9)).unwrap_err();
    match err {
        GatewayError::NotFound(message) => assert!(message.contains("Certificate 9 was not found")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn collection_query_pages_until_short_page() {
    let stub = StubPlatform::start(|request| {
        let body = match request.query_value("pq.pageReturned") {
            Some("1") => r#"[{"Id":1,"Thumbprint":"aa"},{"Id":2,"Thumbprint":"bb"}]"#,
            _ => r#"[{"Id":3,"Thumbprint":"cc"}]"#,
        };
        (200, body.to_string())
    });
    let mut config = stub.config();
    config.page_size = 2;
    let gateway = HttpPlatform::new(config).unwrap();
    let query = CertificateQuery {
        collection_id: Some(7),
        common_names: vec!["Root A".to_string(), "Root B".to_string()],
    };
    let records = gateway.query_certificates(&query).unwrap();
    assert_eq!(records.iter().map(|record| record.id).collect::<Vec<_>>(), vec![1, 2, 3]);

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].query_value("collectionId"), Some("7"));
    assert_eq!(
        requests[0].query_value("pq.queryString"),
        Some("IssuedCN -eq \"Root A\" OR IssuedCN -eq \"Root B\"")
    );
    assert_eq!(requests[1].query_value("pq.returnLimit"), Some("2"));
}

// ============================================================================
// SECTION: Status Mapping
// ============================================================================

#[test]
fn error_statuses_map_to_gateway_errors() {
    let cases: [(u16, &str, fn(&GatewayError) -> bool); 5] = [
        (401, "{}", |err| matches!(err, GatewayError::Unauthorized(_))),
        (409, "{}", |err| matches!(err, GatewayError::Conflict(_))),
        (400, r#"{"Message":"bad alias"}"#, |err| {
            matches!(err, GatewayError::Validation(message) if message.contains("bad alias"))
        }),
        (500, "oops", |err| matches!(err, GatewayError::Transport(_))),
        (302, "", |err| matches!(err, GatewayError::Transport(_))),
    ];
    for (status, body, check) in cases {
        let stub = StubPlatform::fixed(status, body);
        let err = stub.gateway().get_store(&StoreId::new("s-1")).unwrap_err();
        assert!(check(&err), "status {status}: {err:?}");
    }
}

#[test]
fn invalid_json_is_a_protocol_error() {
    let stub = StubPlatform::fixed(200, "not json");
    let err = stub.gateway().get_store(&StoreId::new("s-1")).unwrap_err();
    assert!(matches!(err, GatewayError::Protocol(_)), "{err:?}");
}

#[test]
fn oversized_body_is_rejected() {
    let stub = StubPlatform::fixed(200, &format!("[{}]", "1,".repeat(64) + "1"));
    let mut config = stub.config();
    config.max_response_bytes = 32;
    let gateway = HttpPlatform::new(config).unwrap();
    let err = gateway.get_store_inventory(&StoreId::new("s-1")).unwrap_err();
    assert!(matches!(err, GatewayError::Protocol(_)), "{err:?}");
}

// ============================================================================
// SECTION: Store Jobs
// ============================================================================

#[test]
fn add_job_posts_targets_and_returns_job_ids() {
    let stub = StubPlatform::fixed(200, r#"["job-1"]"#);
    let job = CertificateStoreJob::add(42, StoreId::new("s-1"));
    let receipt = stub.gateway().add_certificate_to_stores(&job).unwrap();
    assert_eq!(receipt.job_ids, vec!["job-1".to_string()]);

    let request = &stub.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/KeyfactorAPI/CertificateStores/Certificates/Add");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(
        request.json(),
        json!({
            "CertificateId": 42,
            "CertificateStores": [{"CertificateStoreId": "s-1", "Overwrite": true}],
            "Schedule": {"Immediate": true}
        })
    );
}

#[test]
fn remove_job_posts_alias_and_certificate_id() {
    let stub = StubPlatform::fixed(200, "");
    let job = CertificateStoreJob::remove(42, StoreId::new("s-2"), "root-a");
    let receipt = stub.gateway().remove_certificate_from_stores(&job).unwrap();
    assert!(receipt.job_ids.is_empty());

    let request = &stub.requests()[0];
    assert_eq!(request.path, "/KeyfactorAPI/CertificateStores/Certificates/Remove");
    assert_eq!(
        request.json(),
        json!({
            "CertificateStores": [
                {"CertificateStoreId": "s-2", "Alias": "root-a", "CertificateId": 42}
            ],
            "Schedule": {"Immediate": true}
        })
    );
}

#[test]
fn remove_without_alias_is_rejected_before_sending() {
    let stub = StubPlatform::fixed(200, "[]");
    let job = CertificateStoreJob::add(42, StoreId::new("s-1"));
    let err = stub.gateway().remove_certificate_from_stores(&job).unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
    assert!(stub.requests().is_empty());
}

// ============================================================================
// SECTION: Stores
// ============================================================================

#[test]
fn store_properties_are_unwrapped_and_zero_container_dropped() {
    let stub = StubPlatform::fixed(
        200,
        r#"{"Id":"s-1","CertStoreType":105,"ClientMachine":"m1","StorePath":"/etc/ssl",
            "ContainerId":0,"AgentId":"agent-1",
            "InventorySchedule":{"Interval":{"Minutes":60}},
            "Properties":"{\"KubeNamespace\":{\"value\":\"default\"},\"Flag\":true}"}"#,
    );
    let record = stub.gateway().get_store(&StoreId::new("s-1")).unwrap();
    assert_eq!(stub.requests()[0].path, "/KeyfactorAPI/CertificateStores/s-1");
    assert_eq!(record.store_type_id, 105);
    assert_eq!(record.container_id, None);
    assert_eq!(record.agent_id, "agent-1");
    assert_eq!(record.inventory_interval_minutes, Some(60));
    assert_eq!(record.properties.get("KubeNamespace"), Some(&json!("default")));
    assert_eq!(record.properties.get("Flag"), Some(&json!(true)));
}

#[test]
fn store_listing_filters_by_type_across_pages() {
    let stub = StubPlatform::start(|request| {
        let body = match request.query_value("pq.pageReturned") {
            Some("1") => {
                r#"[{"Id":"s-1","CertStoreType":105,"ClientMachine":"m1","StorePath":"/a"},
                    {"Id":"s-2","CertStoreType":105,"ClientMachine":"m2","StorePath":"/b"}]"#
            }
            _ => r#"[{"Id":"s-3","CertStoreType":999,"ClientMachine":"m3","StorePath":"/c"}]"#,
        };
        (200, body.to_string())
    });
    let mut config = stub.config();
    config.page_size = 2;
    let gateway = HttpPlatform::new(config).unwrap();
    let records = gateway.list_stores(&StoreFilter::by_type(105)).unwrap();
    let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["s-1", "s-2"]);

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].query_value("pq.queryString"), Some("CertStoreType -eq 105"));
    assert_eq!(requests[0].query_value("pq.pageReturned"), Some("1"));
    assert_eq!(requests[1].query_value("pq.pageReturned"), Some("2"));
}

#[test]
fn store_listing_escapes_quoted_filter_values() {
    let stub = StubPlatform::start(|_| (200, "[]".to_string()));
    let filter = StoreFilter {
        client_machine: Some(r#"host "a""#.to_string()),
        container_name: Some("team\\certs".to_string()),
        ..StoreFilter::default()
    };
    let records = stub.gateway().list_stores(&filter).unwrap();
    assert!(records.is_empty());
    assert_eq!(
        stub.requests()[0].query_value("pq.queryString"),
        Some(r#"ClientMachine -eq "host \"a\"" AND ContainerName -eq "team\\certs""#)
    );
}

#[test]
fn inventory_is_parsed_and_missing_inventory_is_empty() {
    let stub = StubPlatform::start(|request| {
        if request.path.contains("/s-1/") {
            (
                200,
                r#"[{"Name":"root-a","Certificates":[{"Id":7,"Thumbprint":"dddddddddddddddddddddddddddddddddddddddd",
                    "SerialNumber":"07","IssuedDN":"CN=A","IssuerDN":"CN=A"}],
                    "Parameters":{"PrivateKeyEntry":"No"}}]"#
                    .to_string(),
            )
        } else {
            (404, r#"{"Message":"no inventory"}"#.to_string())
        }
    });
    let gateway = stub.gateway();
    let inventory = gateway.get_store_inventory(&StoreId::new("s-1")).unwrap();
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory[0].alias, "root-a");
    assert_eq!(inventory[0].certificates[0].thumbprint, fp('D'));
    assert!(!inventory[0].has_private_key());

    assert!(gateway.get_store_inventory(&StoreId::new("s-9")).unwrap().is_empty());
    assert_eq!(stub.requests()[0].path, "/KeyfactorAPI/CertificateStores/s-1/Inventory");
}

#[test]
fn store_type_by_name_uses_name_route() {
    let stub = StubPlatform::fixed(
        200,
        r#"{"StoreType":200,"ShortName":"K8SCert","Name":"K8S Cert",
            "Properties":[{"Name":"KubeNamespace","DisplayName":"Namespace","Type":"String","Required":false}],
            "PasswordOptions":{"EntrySupported":false,"StoreRequired":true,"Style":"Default"}}"#,
    );
    let descriptor = stub
        .gateway()
        .get_store_type(&StoreTypeRef::Name("K8SCert".to_string()))
        .unwrap();
    assert_eq!(stub.requests()[0].path, "/KeyfactorAPI/CertificateStoreTypes/Name/K8SCert");
    assert_eq!(descriptor.id, 200);
    assert_eq!(descriptor.short_name, "K8SCert");
    assert_eq!(descriptor.properties[0].name, "KubeNamespace");
    assert!(descriptor.password_options.store_required);
}

#[test]
fn create_store_wraps_properties_and_password() {
    let stub = StubPlatform::fixed(200, r#"{"Id":"new-store"}"#);
    let body = json!({
        "ClientMachine": "cluster-1",
        "StorePath": "ns/secret",
        "ContainerId": 0,
        "Properties": {"KubeNamespace": "default"},
        "Password": "s3cret"
    });
    let request = CreateStoreRequest {
        store_type_id: 200,
        body: body.as_object().cloned().unwrap(),
    };
    let id = stub.gateway().create_store(&request).unwrap();
    assert_eq!(id, StoreId::new("new-store"));

    let recorded = &stub.requests()[0];
    assert_eq!(recorded.method, "POST");
    assert_eq!(recorded.path, "/KeyfactorAPI/CertificateStores");
    let sent = recorded.json();
    assert_eq!(sent["CertStoreType"], json!(200));
    assert!(sent.get("ContainerId").is_none());
    assert_eq!(sent["Properties"], json!(r#"{"KubeNamespace":{"value":"default"}}"#));
    assert_eq!(sent["Password"], json!({"Value": "s3cret"}));
}
