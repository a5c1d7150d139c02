// crates/kfutil-core/src/core/errors.rs
// ============================================================================
// Module: Run Errors
// Description: Error kinds and the aggregated per-row error list.
// Purpose: Let every stage return partial results alongside failures.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Root-of-trust runs tolerate partial failure: a lookup or apply error on one
//! row is captured and the run continues. [`ErrorList`] collects those errors
//! per stage and renders them as a single merged message. Fatal conditions are
//! returned as a plain [`RotError`] before any artifact is written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Classification of run errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// Malformed input file, bad header, or conflicting options.
    Input,
    /// Certificate or store could not be resolved.
    Lookup,
    /// Store did not meet the root-of-trust thresholds.
    Eligibility,
    /// Platform rejected an add or remove.
    Apply,
    /// Network or authentication failure against the Platform.
    Transport,
    /// Internal invariant violated.
    Internal,
}

impl ErrorKind {
    /// Returns the stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input error",
            Self::Lookup => "lookup error",
            Self::Eligibility => "eligibility rejection",
            Self::Apply => "apply error",
            Self::Transport => "transport error",
            Self::Internal => "internal error",
        }
    }

    /// Returns true when the kind counts as a run failure.
    ///
    /// Eligibility rejections are reported but are an expected filtering outcome.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        !matches!(self, Self::Eligibility)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Run Error
// ============================================================================

/// A single classified run error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {}{message}", SubjectPrefix(.subject.as_deref()))]
pub struct RotError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Row subject such as a fingerprint or store id.
    pub subject: Option<String>,
    /// Human-readable detail.
    pub message: String,
}

impl RotError {
    /// Creates an error without a subject.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: None,
            message: message.into(),
        }
    }

    /// Creates an error attached to a row subject.
    #[must_use]
    pub fn with_subject(
        kind: ErrorKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            subject: Some(subject.into()),
            message: message.into(),
        }
    }

    /// Creates an input error.
    #[must_use]
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Input, message)
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

/// Renders an optional row subject as `subject: `, or nothing.
struct SubjectPrefix<'a>(
    /// Row subject, when the error has one.
    Option<&'a str>,
);

impl fmt::Display for SubjectPrefix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(subject) => write!(f, "{subject}: "),
            None => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Error List
// ============================================================================

/// Ordered list of accumulated per-row errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorList {
    /// Errors in the order they were recorded.
    errors: Vec<RotError>,
}

impl ErrorList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            errors: Vec::new(),
        }
    }

    /// Appends an error.
    pub fn push(&mut self, error: RotError) {
        self.errors.push(error);
    }

    /// Appends every error from another list.
    pub fn extend(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// Returns true when no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of recorded errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterates the recorded errors.
    pub fn iter(&self) -> std::slice::Iter<'_, RotError> {
        self.errors.iter()
    }

    /// Returns the number of errors of a kind.
    #[must_use]
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|error| error.kind == kind).count()
    }

    /// Returns true when any error counts as a run failure.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.errors.iter().any(|error| error.kind.is_failure())
    }

    /// Returns true when any input error was recorded.
    #[must_use]
    pub fn has_input_errors(&self) -> bool {
        self.errors.iter().any(|error| error.kind == ErrorKind::Input)
    }

    /// Returns the process exit code for the worst recorded error.
    ///
    /// Input errors map to `2`, any other failure to `1`, and a list holding
    /// only eligibility rejections to `0`.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.has_input_errors() {
            2
        } else if self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Returns the merged error if any failure was recorded.
    #[must_use]
    pub fn to_failure(&self) -> Option<String> {
        self.has_failures().then(|| self.to_string())
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            error.fmt(f)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a RotError;
    type IntoIter = std::slice::Iter<'a, RotError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl From<RotError> for ErrorList {
    fn from(error: RotError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_message_joins_rows_in_order() {
        let mut errors = ErrorList::new();
        errors.push(RotError::with_subject(ErrorKind::Lookup, "DDDD", "certificate not found"));
        errors.push(RotError::with_subject(ErrorKind::Apply, "store-1", "rejected"));
        let merged = errors.to_string();
        assert_eq!(
            merged,
            "lookup error: DDDD: certificate not found\napply error: store-1: rejected"
        );
        assert!(errors.has_failures());
        assert!(!errors.has_input_errors());
        assert_eq!(errors.exit_code(), 1);
        errors.push(RotError::input("bad header"));
        assert_eq!(errors.exit_code(), 2);
    }

    #[test]
    fn eligibility_rejections_are_not_failures() {
        let mut errors = ErrorList::new();
        errors.push(RotError::with_subject(ErrorKind::Eligibility, "s2", "5 leaf certificates"));
        assert!(!errors.is_empty());
        assert!(!errors.has_failures());
        assert_eq!(errors.to_failure(), None);
        assert_eq!(errors.exit_code(), 0);
    }

    #[test]
    fn error_without_subject_omits_prefix() {
        let error = RotError::input("missing header");
        assert_eq!(error.to_string(), "input error: missing header");
        let source: &dyn std::error::Error = &error;
        assert!(source.source().is_none());
    }
}
