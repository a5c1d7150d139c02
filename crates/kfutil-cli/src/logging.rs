// crates/kfutil-cli/src/logging.rs
// ============================================================================
// Module: CLI Logging
// Description: tracing subscriber setup for the kfutil binary.
// Purpose: Route diagnostics to stderr so stdout stays machine-readable.
// Dependencies: tracing-subscriber
// ============================================================================

//! ## Overview
//! The filter directive comes from `--log-level`, else `KFUTIL_LOG`, else
//! `warn`. An unparseable directive falls back to the default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "KFUTIL_LOG";

/// Directive used when neither flag nor environment supplies one.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

// ============================================================================
// SECTION: Setup
// ============================================================================

/// Returns the effective filter directive.
#[must_use]
pub fn filter_directive(flag: Option<&str>, env: Option<&str>) -> String {
    flag.or(env)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_LOG_LEVEL)
        .to_string()
}

/// Installs the global stderr subscriber; later calls are ignored.
pub fn init(flag: Option<&str>, env: Option<&str>) {
    let directive = filter_directive(flag, env);
    let filter =
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// SECTION: Tests
// ============================================================================
