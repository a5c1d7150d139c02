// crates/kfutil-cli/tests/common/mod.rs
// ============================================================================
// Module: CLI Test Harness
// Description: Binary runner and loopback Platform stub for CLI tests.
// Purpose: Drive `kfutil` end to end without a real Platform.
// Dependencies: tempfile, tiny_http
// ============================================================================

//! ## Overview
//! [`run_kfutil`] spawns the built binary in a scratch directory with a
//! config file pointing at a [`StubPlatform`], so the environment of the
//! test process never leaks into the run.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use tiny_http::StatusCode;

// ============================================================================
// SECTION: Platform Stub
// ============================================================================

/// Request line and body seen by the stub.
#[derive(Debug, Clone)]
pub struct Seen {
    /// HTTP method.
    pub method: String,
    /// Path without the query string.
    pub path: String,
    /// Raw URL including the query string.
    pub url: String,
    /// Request body.
    pub body: String,
}

/// Loopback server answering through a routing closure.
pub struct StubPlatform {
    /// Origin such as `http://127.0.0.1:4000`.
    pub origin: String,
    /// Requests in arrival order.
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl StubPlatform {
    /// Starts a stub answering `route(request) -> (status, body)`.
    pub fn start<F>(route: F) -> Self
    where
        F: Fn(&Seen) -> (u16, String) + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let url = request.url().to_string();
                let path = url.split('?').next().unwrap_or_default().to_string();
                let entry = Seen {
                    method: request.method().to_string(),
                    path,
                    url,
                    body,
                };
                let (status, text) = route(&entry);
                log.lock().unwrap().push(entry);
                let content_type = Header::from_bytes("Content-Type", "application/json").unwrap();
                let response = Response::from_string(text)
                    .with_status_code(StatusCode(status))
                    .with_header(content_type);
                let _ = request.respond(response);
            }
        });
        Self {
            origin: format!("http://{addr}"),
            seen,
        }
    }

    /// Returns the requests seen so far.
    #[must_use]
    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    /// Returns the requests that would change Platform state.
    #[must_use]
    pub fn mutations(&self) -> Vec<Seen> {
        self.seen().into_iter().filter(|request| request.method == "POST").collect()
    }
}

// ============================================================================
// SECTION: Binary Runner
// ============================================================================

/// Writes `kfutil.toml` with a `default` profile for `origin`.
pub fn write_config(dir: &Path, origin: &str) -> PathBuf {
    let path = dir.join("kfutil.toml");
    let text = format!(
        "[profiles.default]\nhostname = \"{origin}\"\nusername = \"svc\"\npassword = \
         \"pw\"\ndomain = \"CORP\"\ntimeout_ms = 5000\n"
    );
    fs::write(&path, text).unwrap();
    path
}

/// Writes `contents` to `dir/name` and returns the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Runs the binary in `dir` with a scrubbed environment.
pub fn run_kfutil(dir: &Path, args: &[&str]) -> Output {
    Command::new(PathBuf::from(env!("CARGO_BIN_EXE_kfutil")))
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env_remove("KFUTIL_CONFIG")
        .env_remove("KFUTIL_LOG")
        .env_remove("KEYFACTOR_HOSTNAME")
        .env_remove("KEYFACTOR_USERNAME")
        .env_remove("KEYFACTOR_PASSWORD")
        .env_remove("KEYFACTOR_DOMAIN")
        .env_remove("KEYFACTOR_API_PATH")
        .env_remove("KEYFACTOR_ACCESS_TOKEN")
        .env_remove("KFUTIL_CSV_SERVER_USERNAME")
        .env_remove("KFUTIL_CSV_SERVER_PASSWORD")
        .env_remove("KFUTIL_CSV_STORE_PASSWORD")
        .output()
        .unwrap()
}

/// Returns stdout as text.
#[must_use]
pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Returns stderr as text.
#[must_use]
pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Returns a 40-character fingerprint of one repeated hex digit.
#[must_use]
pub fn fp(digit: char) -> String {
    digit.to_ascii_uppercase().to_string().repeat(40)
}
