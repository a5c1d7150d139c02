// crates/kfutil-core/src/core/time.rs
// ============================================================================
// Module: Run Clock
// Description: Clock abstraction and RFC-3339 helpers for artifact timestamps.
// Purpose: Keep audit artifacts reproducible under test.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Audit and reconciled CSVs carry RFC-3339 UTC timestamps. The clock is
//! injected through the run configuration so two runs against identical
//! inputs can produce byte-identical artifacts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock truncated to whole seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        now.replace_nanosecond(0).unwrap_or(now)
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

// ============================================================================
// SECTION: Formatting
// ============================================================================

/// Formats a timestamp as RFC-3339 in UTC.
#[must_use]
pub fn format_rfc3339(value: OffsetDateTime) -> String {
    value.to_offset(UtcOffset::UTC).format(&Rfc3339).unwrap_or_default()
}

/// Parses an RFC-3339 timestamp.
///
/// # Errors
///
/// Returns [`time::error::Parse`] when the value is not RFC-3339.
pub fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(value.trim(), &Rfc3339)
}
