// crates/kfutil-gateway/src/client.rs
// ============================================================================
// Module: HTTP Platform Gateway
// Description: Blocking REST client implementing the Platform gateway.
// Purpose: Resolve certificates and stores and dispatch store jobs over HTTP.
// Dependencies: kfutil-core, reqwest, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`HttpPlatform`] issues bounded, authenticated requests against the
//! Platform REST API and maps HTTP status codes onto [`GatewayError`].
//! Invariants:
//! - Redirects are never followed.
//! - Response bodies are capped at [`HttpPlatformConfig::max_response_bytes`].
//! - Credentials are never logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::Read;
use std::time::Duration;

use kfutil_core::CertificateQuery;
use kfutil_core::CertificateRecord;
use kfutil_core::CertificateRef;
use kfutil_core::CertificateStoreJob;
use kfutil_core::CreateStoreRequest;
use kfutil_core::GatewayError;
use kfutil_core::InventoryEntry;
use kfutil_core::JobReceipt;
use kfutil_core::PlatformGateway;
use kfutil_core::StoreFilter;
use kfutil_core::StoreId;
use kfutil_core::StoreRecord;
use kfutil_core::StoreTypeDescriptor;
use kfutil_core::StoreTypeRef;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::blocking::Response;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::wire::AddRequest;
use crate::wire::CertificateBody;
use crate::wire::CreatedStoreBody;
use crate::wire::InventoryBody;
use crate::wire::RemoveRequest;
use crate::wire::StoreBody;
use crate::wire::StoreTypeBody;
use crate::wire::create_store_body;
use crate::wire::error_message;
use crate::wire::job_ids;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default API path under the Platform host.
pub const DEFAULT_API_PATH: &str = "KeyfactorAPI";

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default response body cap.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Default page size for paginated listings.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Upper bound on pages fetched by one listing.
const MAX_PAGES: usize = 10_000;

/// Header identifying API clients.
const REQUESTED_WITH_HEADER: &str = "x-keyfactor-requested-with";

/// Header selecting the API version.
const API_VERSION_HEADER: &str = "x-keyfactor-api-version";

/// User agent for outbound requests.
const USER_AGENT: &str = concat!("kfutil/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Credentials presented to the Platform.
#[derive(Clone, PartialEq, Eq)]
pub enum PlatformAuth {
    /// HTTP basic authentication.
    Basic {
        /// Username, optionally already qualified as `DOMAIN\user`.
        username: String,
        /// Password.
        password: String,
        /// Domain prefixed to an unqualified username.
        domain: Option<String>,
    },
    /// OAuth bearer token.
    Bearer(String),
}

impl PlatformAuth {
    /// Returns the username sent with basic auth.
    fn qualified_username(username: &str, domain: Option<&str>) -> String {
        match domain.filter(|domain| !domain.is_empty()) {
            Some(domain) if !username.contains('\\') && !username.contains('@') => {
                format!("{domain}\\{username}")
            }
            _ => username.to_string(),
        }
    }

    /// Applies the credentials to a request.
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Basic {
                username,
                password,
                domain,
            } => request
                .basic_auth(Self::qualified_username(username, domain.as_deref()), Some(password)),
            Self::Bearer(token) => request.bearer_auth(token),
        }
    }
}

impl fmt::Debug for PlatformAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic {
                username,
                domain,
                ..
            } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .field("domain", domain)
                .finish(),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

/// HTTP gateway configuration.
///
/// # Invariants
/// - `hostname` may carry an explicit `http://` or `https://` scheme; HTTPS is
///   assumed otherwise.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpPlatformConfig {
    /// Platform hostname.
    pub hostname: String,
    /// API path under the hostname.
    pub api_path: String,
    /// Credentials.
    pub auth: PlatformAuth,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Accept invalid TLS certificates.
    pub skip_tls_verify: bool,
    /// Maximum response body size.
    pub max_response_bytes: usize,
    /// Page size for listings.
    pub page_size: usize,
}

impl HttpPlatformConfig {
    /// Creates a configuration with defaults for everything but host and auth.
    #[must_use]
    pub fn new(hostname: impl Into<String>, auth: PlatformAuth) -> Self {
        Self {
            hostname: hostname.into(),
            api_path: DEFAULT_API_PATH.to_string(),
            auth,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            skip_tls_verify: false,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Returns the API base URL with a trailing slash.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the hostname does not form a URL.
    pub fn base_url(&self) -> Result<Url, GatewayError> {
        let host = self.hostname.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(GatewayError::Config("hostname is required".to_string()));
        }
        let origin = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        let path = self.api_path.trim_matches('/');
        let raw = if path.is_empty() { format!("{origin}/") } else { format!("{origin}/{path}/") };
        Url::parse(&raw).map_err(|err| GatewayError::Config(format!("invalid base url {raw}: {err}")))
    }
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Platform gateway over the REST API.
#[derive(Debug, Clone)]
pub struct HttpPlatform {
    /// Gateway configuration.
    config: HttpPlatformConfig,
    /// API base URL.
    base: Url,
    /// HTTP client.
    client: Client,
}

impl HttpPlatform {
    /// Builds a gateway.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the base URL or client is invalid.
    pub fn new(config: HttpPlatformConfig) -> Result<Self, GatewayError> {
        let base = config.base_url()?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(config.skip_tls_verify)
            .build()
            .map_err(|err| GatewayError::Config(format!("http client build failed: {err}")))?;
        Ok(Self {
            config,
            base,
            client,
        })
    }

    /// Returns the API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Builds an endpoint URL from path segments and query pairs.
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, GatewayError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Config(format!("base url {} cannot hold a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// Sends a request and returns the bounded response body.
    fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Vec<u8>, GatewayError> {
        let path = url.path().to_string();
        let mut request = self
            .client
            .request(method.clone(), url)
            .header(REQUESTED_WITH_HEADER, "APIClient")
            .header(API_VERSION_HEADER, "1")
            .header(ACCEPT, "application/json");
        request = self.config.auth.apply(request);
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body)
                .map_err(|err| GatewayError::Protocol(format!("encoding request: {err}")))?;
            request = request.header(CONTENT_TYPE, "application/json").body(bytes);
        }
        let mut response = request.send().map_err(|err| {
            GatewayError::Transport(format!("{method} {path}: {}", without_url(&err)))
        })?;
        let status = response.status();
        debug!(method = %method, path = path.as_str(), status = status.as_u16(), "platform response");
        let bytes = read_response_limited(&mut response, self.config.max_response_bytes)?;
        if status.is_success() {
            return Ok(bytes);
        }
        let detail = error_message(&bytes).unwrap_or_else(|| status.to_string());
        Err(classify_status(status, format!("{method} {path}: {detail}")))
    }

    /// Sends a GET and decodes the JSON body.
    fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let url = self.endpoint(segments, query)?;
        let bytes = self.send(Method::GET, url, None)?;
        decode(&bytes)
    }

    /// Sends a POST with a JSON body and returns the raw response.
    fn post(&self, segments: &[&str], body: &Value) -> Result<Vec<u8>, GatewayError> {
        let url = self.endpoint(segments, &[])?;
        self.send(Method::POST, url, Some(body))
    }

    /// Fetches every page of a listing.
    fn get_paged<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GatewayError> {
        let page_size = self.config.page_size.max(1);
        let mut items = Vec::new();
        for page in 1 ..= MAX_PAGES {
            let mut paged = query.to_vec();
            paged.push(("pq.pageReturned", page.to_string()));
            paged.push(("pq.returnLimit", page_size.to_string()));
            let batch: Vec<T> = self.get_json(segments, &paged)?;
            let done = batch.len() < page_size;
            items.extend(batch);
            if done {
                return Ok(items);
            }
        }
        Err(GatewayError::Protocol(format!("listing exceeded {MAX_PAGES} pages")))
    }

    /// Lists stores for at most one store type.
    fn list_stores_of_type(
        &self,
        store_type_id: Option<i64>,
        filter: &StoreFilter,
    ) -> Result<Vec<StoreRecord>, GatewayError> {
        let mut clauses = Vec::new();
        if let Some(id) = store_type_id {
            clauses.push(format!("CertStoreType -eq {id}"));
        }
        if let Some(machine) = &filter.client_machine {
            clauses.push(format!("ClientMachine -eq {}", quote_term(machine)));
        }
        if let Some(container_id) = filter.effective_container_id() {
            clauses.push(format!("ContainerId -eq {container_id}"));
        }
        if let Some(name) = &filter.container_name {
            clauses.push(format!("ContainerName -eq {}", quote_term(name)));
        }
        let query = if clauses.is_empty() {
            Vec::new()
        } else {
            vec![("pq.queryString", clauses.join(" AND "))]
        };
        let bodies: Vec<StoreBody> = self.get_paged(&["CertificateStores"], &query)?;
        let mut records = Vec::with_capacity(bodies.len());
        for body in bodies {
            records.push(body.into_record()?);
        }
        Ok(records)
    }
}

impl PlatformGateway for HttpPlatform {
    fn lookup_certificate(
        &self,
        reference: &CertificateRef,
    ) -> Result<CertificateRecord, GatewayError> {
        let include = ("includeLocations", "true".to_string());
        match reference {
            CertificateRef::Id(id) => {
                let id = id.to_string();
                let body: CertificateBody =
                    self.get_json(&["Certificates", id.as_str()], &[include])?;
                Ok(body.into())
            }
            CertificateRef::Thumbprint(thumbprint) => {
                let query = ("pq.queryString", format!("Thumbprint -eq \"{thumbprint}\""));
                let mut bodies: Vec<CertificateBody> =
                    self.get_json(&["Certificates"], &[query, include])?;
                if bodies.len() > 1 {
                    warn!(
                        thumbprint = thumbprint.as_str(),
                        matches = bodies.len(),
                        "multiple certificates share a thumbprint, using the first"
                    );
                }
                if bodies.is_empty() {
                    return Err(GatewayError::NotFound(format!("certificate {thumbprint}")));
                }
                Ok(bodies.swap_remove(0).into())
            }
        }
    }

    fn query_certificates(
        &self,
        query: &CertificateQuery,
    ) -> Result<Vec<CertificateRecord>, GatewayError> {
        let mut pairs = vec![("includeLocations", "true".to_string())];
        if let Some(collection_id) = query.collection_id {
            pairs.push(("collectionId", collection_id.to_string()));
        }
        if !query.common_names.is_empty() {
            let clauses: Vec<String> = query
                .common_names
                .iter()
                .map(|name| format!("IssuedCN -eq {}", quote_term(name)))
                .collect();
            pairs.push(("pq.queryString", clauses.join(" OR ")));
        }
        let bodies: Vec<CertificateBody> = self.get_paged(&["Certificates"], &pairs)?;
        Ok(bodies.into_iter().map(CertificateRecord::from).collect())
    }

    fn list_stores(&self, filter: &StoreFilter) -> Result<Vec<StoreRecord>, GatewayError> {
        let mut records = Vec::new();
        if filter.store_type_ids.is_empty() {
            records = self.list_stores_of_type(None, filter)?;
        } else {
            for store_type_id in &filter.store_type_ids {
                records.extend(self.list_stores_of_type(Some(*store_type_id), filter)?);
            }
        }
        records.retain(|record| filter.matches(record));
        Ok(records)
    }

    fn get_store(&self, store_id: &StoreId) -> Result<StoreRecord, GatewayError> {
        let body: StoreBody = self.get_json(&["CertificateStores", store_id.as_str()], &[])?;
        body.into_record()
    }

    fn get_store_inventory(&self, store_id: &StoreId) -> Result<Vec<InventoryEntry>, GatewayError> {
        let result: Result<Vec<InventoryBody>, GatewayError> =
            self.get_json(&["CertificateStores", store_id.as_str(), "Inventory"], &[]);
        match result {
            Ok(bodies) => Ok(bodies.into_iter().map(InventoryEntry::from).collect()),
            Err(GatewayError::NotFound(_)) => {
                debug!(store_id = %store_id, "store has no inventory");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    fn get_store_type(
        &self,
        reference: &StoreTypeRef,
    ) -> Result<StoreTypeDescriptor, GatewayError> {
        let body: StoreTypeBody = match reference {
            StoreTypeRef::Id(id) => {
                let id = id.to_string();
                self.get_json(&["CertificateStoreTypes", id.as_str()], &[])?
            }
            StoreTypeRef::Name(name) => {
                self.get_json(&["CertificateStoreTypes", "Name", name.as_str()], &[])?
            }
        };
        Ok(body.into())
    }

    fn add_certificate_to_stores(
        &self,
        job: &CertificateStoreJob,
    ) -> Result<JobReceipt, GatewayError> {
        let body = to_value(&AddRequest::from(job))?;
        let response = self.post(&["CertificateStores", "Certificates", "Add"], &body)?;
        Ok(JobReceipt {
            job_ids: job_ids(&response),
        })
    }

    fn remove_certificate_from_stores(
        &self,
        job: &CertificateStoreJob,
    ) -> Result<JobReceipt, GatewayError> {
        if job.targets.iter().any(|target| target.alias.as_deref().is_none_or(str::is_empty)) {
            return Err(GatewayError::Validation("remove requires an alias".to_string()));
        }
        let body = to_value(&RemoveRequest::from(job))?;
        let response = self.post(&["CertificateStores", "Certificates", "Remove"], &body)?;
        Ok(JobReceipt {
            job_ids: job_ids(&response),
        })
    }

    fn create_store(&self, request: &CreateStoreRequest) -> Result<StoreId, GatewayError> {
        let body = create_store_body(request)?;
        let response = self.post(&["CertificateStores"], &body)?;
        let created: CreatedStoreBody = decode(&response)?;
        Ok(StoreId::new(created.id))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a non-success status onto a gateway error.
fn classify_status(status: StatusCode, message: String) -> GatewayError {
    match status.as_u16() {
        401 | 403 => GatewayError::Unauthorized(message),
        404 => GatewayError::NotFound(message),
        409 => GatewayError::Conflict(message),
        400 | 422 => GatewayError::Validation(message),
        _ => GatewayError::Transport(message),
    }
}

/// Wraps a query term in double quotes, escaping embedded quotes and backslashes.
fn quote_term(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Decodes a JSON response body.
fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(bytes)
        .map_err(|err| GatewayError::Protocol(format!("invalid response body: {err}")))
}

/// Serializes a request body.
fn to_value<T: serde::Serialize>(body: &T) -> Result<Value, GatewayError> {
    serde_json::to_value(body).map_err(|err| GatewayError::Protocol(format!("encoding request: {err}")))
}

/// Renders a transport error without echoing the request URL.
fn without_url(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        let mut message = err.to_string();
        if let Some(url) = err.url() {
            message = message.replace(url.as_str(), "<url>");
        }
        message
    }
}

/// Reads a response body up to `max_bytes`.
fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, GatewayError> {
    let limit = u64::try_from(max_bytes)
        .map_err(|_| GatewayError::Config("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = response.content_length()
        && expected > limit
    {
        return Err(GatewayError::Protocol("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    response
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|err| GatewayError::Transport(format!("reading response: {err}")))?;
    if buf.len() > max_bytes {
        return Err(GatewayError::Protocol("response exceeds size limit".to_string()));
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    fn basic() -> PlatformAuth {
        PlatformAuth::Basic {
            username: "svc".to_string(),
            password: "pw".to_string(),
            domain: Some("CORP".to_string()),
        }
    }

    #[test]
    fn base_url_defaults_to_https_and_api_path() {
        let config = HttpPlatformConfig::new("platform.example.com", basic());
        assert_eq!(config.base_url().unwrap().as_str(), "https://platform.example.com/KeyfactorAPI/");
        let mut local = HttpPlatformConfig::new("http://127.0.0.1:8080/", basic());
        local.api_path = "/api/".to_string();
        assert_eq!(local.base_url().unwrap().as_str(), "http://127.0.0.1:8080/api/");
        assert!(HttpPlatformConfig::new(" ", basic()).base_url().is_err());
    }

    #[test]
    fn domain_is_prefixed_only_for_bare_usernames() {
        assert_eq!(PlatformAuth::qualified_username("svc", Some("CORP")), "CORP\\svc");
        assert_eq!(PlatformAuth::qualified_username("OTHER\\svc", Some("CORP")), "OTHER\\svc");
        assert_eq!(PlatformAuth::qualified_username("svc@corp.io", Some("CORP")), "svc@corp.io");
        assert_eq!(PlatformAuth::qualified_username("svc", None), "svc");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", basic());
        assert!(!rendered.contains("pw\""));
        assert!(rendered.contains("<redacted>"));
        assert!(!format!("{:?}", PlatformAuth::Bearer("tok-123".to_string())).contains("tok-123"));
    }

    #[test]
    fn endpoint_encodes_segments_and_query() {
        let platform = HttpPlatform::new(HttpPlatformConfig::new("http://h", basic())).unwrap();
        let url = platform
            .endpoint(&["CertificateStoreTypes", "Name", "K8S Cert"], &[("a", "x y".to_string())])
            .unwrap();
        assert_eq!(url.as_str(), "http://h/KeyfactorAPI/CertificateStoreTypes/Name/K8S%20Cert?a=x+y");
    }

    #[test]
    fn query_terms_escape_quotes() {
        assert_eq!(quote_term("host-a"), "\"host-a\"");
        assert_eq!(quote_term(r#"a"b"#), r#""a\"b""#);
        assert_eq!(quote_term(r"C:\certs"), r#""C:\\certs""#);
    }

    #[test]
    fn statuses_map_to_error_kinds() {
        let kind = |code: u16| classify_status(StatusCode::from_u16(code).unwrap(), String::new());
        assert!(matches!(kind(401), GatewayError::Unauthorized(_)));
        assert!(matches!(kind(403), GatewayError::Unauthorized(_)));
        assert!(matches!(kind(404), GatewayError::NotFound(_)));
        assert!(matches!(kind(409), GatewayError::Conflict(_)));
        assert!(matches!(kind(422), GatewayError::Validation(_)));
        assert!(matches!(kind(302), GatewayError::Transport(_)));
        assert!(matches!(kind(503), GatewayError::Transport(_)));
    }
}
