//! Profile load validation tests for kfutil-config.
// crates/kfutil-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate path resolution, limits, overrides, and auth rules.
// Purpose: Ensure profile loading is strict and fail-closed.
// =============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use kfutil_config::AuthConfig;
use kfutil_config::ConfigError;
use kfutil_config::ConnectionProfile;
use kfutil_config::load_profile_with_env;
use tempfile::NamedTempFile;
use tempfile::TempDir;

type TestResult = Result<(), String>;

/// Builds an environment lookup from fixed pairs.
fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let map: BTreeMap<String, String> =
        pairs.iter().map(|(name, value)| ((*name).to_string(), (*value).to_string())).collect();
    move |name| map.get(name).cloned()
}

/// Writes config text to a temporary file.
fn config_file(content: &str) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(content.as_bytes()).map_err(|err| err.to_string())?;
    Ok(file)
}

fn assert_invalid(result: Result<ConnectionProfile, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid profile load".to_string()),
    }
}

const BASIC_PROFILE: &str = r#"
[profiles.default]
hostname = "platform.example.com"
username = "svc"
password = "pw"
domain = "CORP"

[profiles.lab]
hostname = "lab.example.com"
access_token = "tok"
api_path = "/api/"
timeout_ms = 5000
skip_tls_verify = true
"#;

#[test]
fn explicit_path_loads_named_profiles() -> TestResult {
    let file = config_file(BASIC_PROFILE)?;
    let default = load_profile_with_env(Some(file.path()), None, env_of(&[]))
        .map_err(|err| err.to_string())?;
    if default.hostname != "platform.example.com" || default.api_path != "KeyfactorAPI" {
        return Err(format!("unexpected default profile: {default:?}"));
    }
    if !matches!(&default.auth, AuthConfig::Basic { domain: Some(domain), .. } if domain == "CORP") {
        return Err("expected basic auth with domain".to_string());
    }
    let lab = load_profile_with_env(Some(file.path()), Some("lab"), env_of(&[]))
        .map_err(|err| err.to_string())?;
    if lab.api_path != "api" || lab.timeout_ms != 5000 || !lab.skip_tls_verify {
        return Err(format!("unexpected lab profile: {lab:?}"));
    }
    if lab.auth != AuthConfig::Token("tok".to_string()) {
        return Err("expected token auth".to_string());
    }
    Ok(())
}

#[test]
fn environment_overrides_file_values() -> TestResult {
    let file = config_file(BASIC_PROFILE)?;
    let env = env_of(&[("KEYFACTOR_HOSTNAME", "override.example.com"), ("KEYFACTOR_PASSWORD", "pw2")]);
    let profile = load_profile_with_env(Some(file.path()), None, env).map_err(|err| err.to_string())?;
    if profile.hostname != "override.example.com" {
        return Err(format!("hostname not overridden: {}", profile.hostname));
    }
    match profile.auth {
        AuthConfig::Basic { password, .. } if password == "pw2" => Ok(()),
        other => Err(format!("password not overridden: {other:?}")),
    }
}

#[test]
fn config_env_var_selects_the_file() -> TestResult {
    let file = config_file(BASIC_PROFILE)?;
    let path = file.path().to_string_lossy().to_string();
    let profile = load_profile_with_env(None, None, env_of(&[("KFUTIL_CONFIG", path.as_str())]))
        .map_err(|err| err.to_string())?;
    if profile.hostname != "platform.example.com" {
        return Err(format!("unexpected hostname {}", profile.hostname));
    }
    Ok(())
}

#[test]
fn missing_default_file_is_tolerated_with_env_hostname() -> TestResult {
    let home = TempDir::new().map_err(|err| err.to_string())?;
    let home_path = home.path().to_string_lossy().to_string();
    let env = env_of(&[
        ("HOME", home_path.as_str()),
        ("KEYFACTOR_HOSTNAME", "env.example.com"),
        ("KEYFACTOR_ACCESS_TOKEN", "tok"),
    ]);
    let profile = load_profile_with_env(None, None, env).map_err(|err| err.to_string())?;
    if profile.hostname != "env.example.com" || profile.timeout_ms != 30_000 {
        return Err(format!("unexpected profile {profile:?}"));
    }
    Ok(())
}

#[test]
fn missing_default_file_without_env_names_the_profile() -> TestResult {
    let home = TempDir::new().map_err(|err| err.to_string())?;
    let home_path = home.path().to_string_lossy().to_string();
    let result = load_profile_with_env(None, Some("prod"), env_of(&[("HOME", home_path.as_str())]));
    match result {
        Err(ConfigError::MissingProfile(name)) if name == "prod" => Ok(()),
        other => Err(format!("expected missing profile, got {other:?}")),
    }
}

#[test]
fn default_file_under_home_is_read() -> TestResult {
    let home = TempDir::new().map_err(|err| err.to_string())?;
    let dir = home.path().join(".keyfactor");
    fs::create_dir_all(&dir).map_err(|err| err.to_string())?;
    fs::write(dir.join("kfutil.toml"), BASIC_PROFILE).map_err(|err| err.to_string())?;
    let home_path = home.path().to_string_lossy().to_string();
    let profile = load_profile_with_env(None, Some("lab"), env_of(&[("HOME", home_path.as_str())]))
        .map_err(|err| err.to_string())?;
    if profile.hostname != "lab.example.com" {
        return Err(format!("unexpected hostname {}", profile.hostname));
    }
    Ok(())
}

#[test]
fn explicit_missing_path_is_an_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    assert_invalid(load_profile_with_env(Some(&path), None, env_of(&[])), "config io error")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(
        load_profile_with_env(Some(path), None, env_of(&[])),
        "config path component too long",
    )
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(
        load_profile_with_env(Some(file.path()), None, env_of(&[])),
        "config file exceeds size limit",
    )
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(
        load_profile_with_env(Some(file.path()), None, env_of(&[])),
        "config file must be utf-8",
    )
}

#[test]
fn load_rejects_unknown_fields() -> TestResult {
    let file = config_file("[profiles.default]\nhostname = \"h\"\nport = 1\n")?;
    assert_invalid(load_profile_with_env(Some(file.path()), None, env_of(&[])), "config parse error")
}

#[test]
fn load_rejects_profile_without_hostname() -> TestResult {
    let file = config_file("[profiles.default]\naccess_token = \"tok\"\n")?;
    assert_invalid(
        load_profile_with_env(Some(file.path()), None, env_of(&[])),
        "profiles.default: hostname is required",
    )
}

#[test]
fn load_rejects_profile_without_credentials() -> TestResult {
    let file = config_file("[profiles.default]\nhostname = \"h\"\n")?;
    assert_invalid(
        load_profile_with_env(Some(file.path()), None, env_of(&[])),
        "credentials are required",
    )
}

#[test]
fn load_rejects_username_without_password() -> TestResult {
    let file = config_file("[profiles.default]\nhostname = \"h\"\nusername = \"svc\"\n")?;
    assert_invalid(
        load_profile_with_env(Some(file.path()), None, env_of(&[])),
        "password is required",
    )
}
