// crates/kfutil-gateway/tests/common/mod.rs
// ============================================================================
// Module: Platform Stub Server
// Description: tiny_http server standing in for the Platform REST API.
// Purpose: Record requests and serve canned responses to the HTTP gateway.
// Dependencies: kfutil-gateway, reqwest, tiny_http
// ============================================================================

//! ## Overview
//! [`StubPlatform`] answers every request through a routing closure and
//! records what it received so tests can assert on paths, headers, and bodies.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use kfutil_gateway::HttpPlatform;
use kfutil_gateway::HttpPlatformConfig;
use kfutil_gateway::PlatformAuth;
use reqwest::Url;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use tiny_http::StatusCode;

// ============================================================================
// SECTION: Recorded Requests
// ============================================================================

/// Request as seen by the stub.
#[derive(Debug, Clone)]
pub struct Recorded {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Decoded query pairs.
    pub query: Vec<(String, String)>,
    /// Headers with lower-cased names.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: String,
}

impl Recorded {
    /// Returns a header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field == &name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    /// Returns a query value.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(field, _)| field == name).map(|(_, value)| value.as_str())
    }

    /// Parses the body as JSON.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

// ============================================================================
// SECTION: Stub Server
// ============================================================================

/// Running stub server.
pub struct StubPlatform {
    /// Origin of the stub, for example `http://127.0.0.1:1234`.
    pub origin: String,
    /// Requests in arrival order.
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubPlatform {
    /// Starts a stub that answers with `route(request) -> (status, body)`.
    pub fn start<F>(route: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, String) + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let parsed = Url::parse(&format!("http://stub{}", request.url())).unwrap();
                let recorded = Recorded {
                    method: request.method().to_string(),
                    path: parsed.path().to_string(),
                    query: parsed
                        .query_pairs()
                        .map(|(name, value)| (name.into_owned(), value.into_owned()))
                        .collect(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|header| {
                            (
                                header.field.as_str().as_str().to_ascii_lowercase(),
                                header.value.as_str().to_string(),
                            )
                        })
                        .collect(),
                    body,
                };
                let (status, text) = route(&recorded);
                log.lock().unwrap().push(recorded);
                let content_type = Header::from_bytes("Content-Type", "application/json").unwrap();
                let response = Response::from_string(text)
                    .with_status_code(StatusCode(status))
                    .with_header(content_type);
                let _ = request.respond(response);
            }
        });
        Self {
            origin: format!("http://{addr}"),
            requests,
        }
    }

    /// Starts a stub that answers every request the same way.
    pub fn fixed(status: u16, body: &str) -> Self {
        let body = body.to_string();
        Self::start(move |_| (status, body.clone()))
    }

    /// Returns the recorded requests.
    #[must_use]
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns a gateway configuration pointed at the stub.
    #[must_use]
    pub fn config(&self) -> HttpPlatformConfig {
        let mut config = HttpPlatformConfig::new(
            self.origin.clone(),
            PlatformAuth::Basic {
                username: "svc".to_string(),
                password: "pw".to_string(),
                domain: Some("CORP".to_string()),
            },
        );
        config.timeout_ms = 5_000;
        config
    }

    /// Returns a gateway pointed at the stub.
    #[must_use]
    pub fn gateway(&self) -> HttpPlatform {
        HttpPlatform::new(self.config()).unwrap()
    }
}

/// Returns a 40-character fingerprint of one repeated hex digit.
#[must_use]
pub fn fp(digit: char) -> String {
    digit.to_ascii_uppercase().to_string().repeat(40)
}
