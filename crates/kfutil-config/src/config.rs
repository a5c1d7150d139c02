// crates/kfutil-config/src/config.rs
// ============================================================================
// Module: kfutil Configuration
// Description: Profile file loading, environment overrides, and validation.
// Purpose: Produce a validated Platform connection profile with hard limits.
// Dependencies: serde, toml, tracing
// ============================================================================

//! ## Overview
//! Profiles live under `[profiles.<name>]` in `kfutil.toml`. The path comes
//! from `--config`, else `KFUTIL_CONFIG`, else `$HOME/.keyfactor/kfutil.toml`.
//! `KEYFACTOR_*` variables override file values after load, and a missing
//! default file is tolerated when the environment supplies a hostname.
//! Validation fails closed: a profile must name a host and exactly one
//! authentication mode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "KFUTIL_CONFIG";
/// Directory under `$HOME` holding the default config file.
const DEFAULT_CONFIG_DIR: &str = ".keyfactor";
/// Default configuration filename.
const DEFAULT_CONFIG_NAME: &str = "kfutil.toml";
/// Profile used when none is requested.
pub const DEFAULT_PROFILE: &str = "default";
/// Default API path under the Platform host.
pub const DEFAULT_API_PATH: &str = "KeyfactorAPI";
/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Smallest accepted request timeout in milliseconds.
pub const MIN_TIMEOUT_MS: u64 = 1_000;
/// Largest accepted request timeout in milliseconds.
pub const MAX_TIMEOUT_MS: u64 = 120_000;
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum hostname length.
const MAX_HOSTNAME_LENGTH: usize = 253;

/// Environment override for the Platform hostname.
pub const HOSTNAME_ENV_VAR: &str = "KEYFACTOR_HOSTNAME";
/// Environment override for the basic-auth username.
pub const USERNAME_ENV_VAR: &str = "KEYFACTOR_USERNAME";
/// Environment override for the basic-auth password.
pub const PASSWORD_ENV_VAR: &str = "KEYFACTOR_PASSWORD";
/// Environment override for the basic-auth domain.
pub const DOMAIN_ENV_VAR: &str = "KEYFACTOR_DOMAIN";
/// Environment override for the API path.
pub const API_PATH_ENV_VAR: &str = "KEYFACTOR_API_PATH";
/// Environment override for the bearer token.
pub const ACCESS_TOKEN_ENV_VAR: &str = "KEYFACTOR_ACCESS_TOKEN";

// ============================================================================
// SECTION: File Model
// ============================================================================

/// Parsed `kfutil.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KfutilConfig {
    /// Named connection profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

/// One `[profiles.<name>]` table before validation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Platform hostname, optionally with an explicit scheme.
    #[serde(default)]
    pub hostname: Option<String>,
    /// API path under the hostname.
    #[serde(default)]
    pub api_path: Option<String>,
    /// Basic-auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Option<String>,
    /// Basic-auth domain.
    #[serde(default)]
    pub domain: Option<String>,
    /// Bearer token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub skip_tls_verify: bool,
}

impl fmt::Debug for ProfileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileConfig")
            .field("hostname", &self.hostname)
            .field("api_path", &self.api_path)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("domain", &self.domain)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .finish()
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            api_path: None,
            username: None,
            password: None,
            domain: None,
            access_token: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            skip_tls_verify: false,
        }
    }
}

/// Serde default for [`ProfileConfig::timeout_ms`].
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ProfileConfig {
    /// Applies `KEYFACTOR_*` overrides; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let targets: [(&str, &mut Option<String>); 6] = [
            (HOSTNAME_ENV_VAR, &mut self.hostname),
            (USERNAME_ENV_VAR, &mut self.username),
            (PASSWORD_ENV_VAR, &mut self.password),
            (DOMAIN_ENV_VAR, &mut self.domain),
            (API_PATH_ENV_VAR, &mut self.api_path),
            (ACCESS_TOKEN_ENV_VAR, &mut self.access_token),
        ];
        for (name, slot) in targets {
            if let Some(value) = read(name) {
                debug!(variable = name, "config value overridden from environment");
                *slot = Some(value);
            }
        }
    }

    /// Validates the profile and resolves its authentication mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the host, auth, or timeout is invalid.
    pub fn validate(&self, name: &str) -> Result<ConnectionProfile, ConfigError> {
        let hostname = non_empty(self.hostname.as_deref())
            .ok_or_else(|| invalid(name, "hostname is required"))?;
        if hostname.len() > MAX_HOSTNAME_LENGTH || hostname.chars().any(char::is_whitespace) {
            return Err(invalid(name, "hostname is malformed"));
        }
        let api_path = non_empty(self.api_path.as_deref())
            .map_or_else(|| DEFAULT_API_PATH.to_string(), |path| path.trim_matches('/').to_string());
        if !(MIN_TIMEOUT_MS ..= MAX_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(invalid(
                name,
                &format!("timeout_ms must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}"),
            ));
        }
        let username = non_empty(self.username.as_deref());
        let password = non_empty(self.password.as_deref());
        let token = non_empty(self.access_token.as_deref());
        let auth = match (username, password, token) {
            (Some(username), Some(password), None) => AuthConfig::Basic {
                username: username.to_string(),
                password: password.to_string(),
                domain: non_empty(self.domain.as_deref()).map(str::to_string),
            },
            (None, None, Some(token)) => AuthConfig::Token(token.to_string()),
            (None, None, None) => {
                return Err(invalid(
                    name,
                    "credentials are required (username and password or access_token)",
                ));
            }
            (_, _, Some(_)) => {
                return Err(invalid(name, "exactly one auth mode is allowed"));
            }
            (Some(_), None, None) => return Err(invalid(name, "password is required")),
            (None, Some(_), None) => return Err(invalid(name, "username is required")),
        };
        Ok(ConnectionProfile {
            name: name.to_string(),
            hostname: hostname.to_string(),
            api_path,
            auth,
            timeout_ms: self.timeout_ms,
            skip_tls_verify: self.skip_tls_verify,
        })
    }
}

// ============================================================================
// SECTION: Validated Profile
// ============================================================================

/// Authentication mode resolved from a profile.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    /// Username and password, optionally domain-qualified.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
        /// Domain prefixed to an unqualified username.
        domain: Option<String>,
    },
    /// Bearer token.
    Token(String),
}

impl fmt::Debug for AuthConfig {
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
            Self::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

/// Validated connection profile.
///
/// # Invariants
/// - `hostname` is non-empty and has no whitespace.
/// - `timeout_ms` lies within `MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    /// Profile name.
    pub name: String,
    /// Platform hostname.
    pub hostname: String,
    /// API path without surrounding slashes.
    pub api_path: String,
    /// Authentication mode.
    pub auth: AuthConfig,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Accept invalid TLS certificates.
    pub skip_tls_verify: bool,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl KfutilConfig {
    /// Parses configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is malformed.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads a config file from disk with size and encoding limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when reading or parsing fails.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }
}

/// Loads and validates a connection profile using the process environment.
///
/// # Errors
///
/// Returns [`ConfigError`] when loading or validation fails.
pub fn load_profile(
    path: Option<&Path>,
    profile: Option<&str>,
) -> Result<ConnectionProfile, ConfigError> {
    load_profile_with_env(path, profile, |name| env::var(name).ok())
}

/// Loads and validates a connection profile with an injected environment.
///
/// # Errors
///
/// Returns [`ConfigError`] when loading or validation fails:
/// - an explicit path that cannot be read is an I/O error;
/// - a missing default file without `KEYFACTOR_HOSTNAME` names the missing profile.
pub fn load_profile_with_env<F>(
    path: Option<&Path>,
    profile: Option<&str>,
    lookup: F,
) -> Result<ConnectionProfile, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let name = profile.map_or(DEFAULT_PROFILE, str::trim);
    let config = match resolve_path(path, &lookup)? {
        ConfigPath::Explicit(path) => KfutilConfig::load_file(&path)?,
        ConfigPath::Default(path) => match fs::metadata(&path) {
            Ok(_) => KfutilConfig::load_file(&path)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using environment only");
                KfutilConfig::default()
            }
            Err(err) => return Err(ConfigError::Io(err.to_string())),
        },
        ConfigPath::None => KfutilConfig::default(),
    };
    let env_host = lookup(HOSTNAME_ENV_VAR).is_some_and(|value| !value.trim().is_empty());
    let mut selected = match config.profiles.get(name) {
        Some(selected) => selected.clone(),
        None if env_host => ProfileConfig::default(),
        None => return Err(ConfigError::MissingProfile(name.to_string())),
    };
    selected.apply_env(&lookup);
    selected.validate(name)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Requested profile is absent and the environment names no host.
    #[error("profile not found: {0}")]
    MissingProfile(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Config path origin; only an explicit path must exist.
enum ConfigPath {
    /// From `--config` or `KFUTIL_CONFIG`.
    Explicit(PathBuf),
    /// Default location under `$HOME`.
    Default(PathBuf),
    /// No path could be derived.
    None,
}

/// Resolves the config path from CLI, environment, or home directory.
fn resolve_path<F>(path: Option<&Path>, lookup: &F) -> Result<ConfigPath, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = path {
        return Ok(ConfigPath::Explicit(path.to_path_buf()));
    }
    if let Some(env_path) = lookup(CONFIG_ENV_VAR).filter(|value| !value.trim().is_empty()) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(ConfigPath::Explicit(PathBuf::from(env_path)));
    }
    Ok(lookup("HOME").filter(|home| !home.is_empty()).map_or(ConfigPath::None, |home| {
        ConfigPath::Default(PathBuf::from(home).join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_NAME))
    }))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Returns the trimmed value when it is non-empty.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Builds a profile-scoped validation error.
fn invalid(profile: &str, message: &str) -> ConfigError {
    ConfigError::Invalid(format!("profiles.{profile}: {message}"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
