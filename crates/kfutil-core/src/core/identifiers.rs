// crates/kfutil-core/src/core/identifiers.rs
// ============================================================================
// Module: kfutil Identifiers
// Description: Typed identifiers for certificates, stores, and store types.
// Purpose: Normalize external references before they reach the Platform.
// Dependencies: regex, serde
// ============================================================================

//! ## Overview
//! Certificates are referenced either by a 40-hex fingerprint or by the
//! Platform's integer id. Fingerprints are normalized to upper case so set
//! membership against store inventories is case-insensitive. Store ids are
//! opaque Platform-assigned strings and are never interpreted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Pattern matching a SHA-1 certificate fingerprint.
static THUMBPRINT_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{40}$"));

/// Returns true when `value` is a 40-hex fingerprint.
#[must_use]
pub fn is_thumbprint(value: &str) -> bool {
    matches!(&*THUMBPRINT_PATTERN, Ok(pattern) if pattern.is_match(value))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Value is neither a fingerprint nor an integer id.
    #[error("invalid certificate reference: {0}")]
    InvalidCertificate(String),
    /// Value is not a 40-hex fingerprint.
    #[error("invalid thumbprint: {0}")]
    InvalidThumbprint(String),
    /// Value is empty.
    #[error("empty identifier")]
    Empty,
}

// ============================================================================
// SECTION: Thumbprint
// ============================================================================

/// Upper-case 40-hex certificate fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Thumbprint(String);

impl Thumbprint {
    /// Parses and normalizes a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidThumbprint`] when `value` is not 40 hex characters.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let trimmed = value.trim();
        if !is_thumbprint(trimmed) {
            return Err(IdentifierError::InvalidThumbprint(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Normalizes a fingerprint string for comparisons without validating it.
#[must_use]
pub fn normalize_thumbprint(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}

// ============================================================================
// SECTION: Certificate Reference
// ============================================================================

/// External reference to a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CertificateRef {
    /// Content-addressed fingerprint.
    Thumbprint(Thumbprint),
    /// Platform integer id.
    Id(i64),
}

impl CertificateRef {
    /// Parses a fingerprint or decimal id; 40 hex characters always win.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the value is empty or unrecognized.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if is_thumbprint(trimmed) {
            return Thumbprint::parse(trimmed).map(Self::Thumbprint);
        }
        trimmed
            .parse::<i64>()
            .ok()
            .filter(|id| *id >= 0)
            .map(Self::Id)
            .ok_or_else(|| IdentifierError::InvalidCertificate(trimmed.to_string()))
    }
}

impl fmt::Display for CertificateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thumbprint(thumbprint) => thumbprint.fmt(f),
            Self::Id(id) => write!(f, "id {id}"),
        }
    }
}

// ============================================================================
// SECTION: Store Identifiers
// ============================================================================

/// Platform-assigned certificate store identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    /// Creates a new store identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for StoreId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StoreId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Reference to a store type by short name or integer id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreTypeRef {
    /// Short name such as `PEM` or `JKS`.
    Name(String),
    /// Platform integer id.
    Id(i64),
}

impl StoreTypeRef {
    /// Parses a store type reference; all-digit values are ids.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::Empty`] when the value is blank.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        Ok(trimmed.parse::<i64>().map_or_else(|_| Self::Name(trimmed.to_string()), Self::Id))
    }
}

impl fmt::Display for StoreTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => name.fmt(f),
            Self::Id(id) => id.fmt(f),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn thumbprint_is_normalized_to_upper_case() {
        let value = "ab".repeat(20);
        let thumbprint = Thumbprint::parse(&value).unwrap();
        assert_eq!(thumbprint.as_str(), "AB".repeat(20));
    }

    #[test]
    fn certificate_ref_prefers_thumbprint_for_forty_digits() {
        let digits = "1".repeat(40);
        assert!(matches!(CertificateRef::parse(&digits).unwrap(), CertificateRef::Thumbprint(_)));
        assert_eq!(CertificateRef::parse(" 42 ").unwrap(), CertificateRef::Id(42));
    }

    #[test]
    fn certificate_ref_rejects_garbage() {
        assert_eq!(CertificateRef::parse(""), Err(IdentifierError::Empty));
        assert!(CertificateRef::parse("not-a-cert").is_err());
        assert!(CertificateRef::parse("-1").is_err());
        assert!(CertificateRef::parse(&"A".repeat(39)).is_err());
    }

    #[test]
    fn store_type_ref_parses_ids_and_names() {
        assert_eq!(StoreTypeRef::parse("105").unwrap(), StoreTypeRef::Id(105));
        assert_eq!(StoreTypeRef::parse("K8SCert").unwrap(), StoreTypeRef::Name("K8SCert".into()));
    }
}
