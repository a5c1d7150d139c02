// crates/kfutil-config/src/lib.rs
// ============================================================================
// Module: kfutil Config Library
// Description: Connection profile model and loader.
// Purpose: Single source of truth for kfutil.toml semantics.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! `kfutil-config` loads Platform connection profiles from `kfutil.toml`,
//! applies `KEYFACTOR_*` environment overrides, and validates the result
//! fail-closed. Config inputs are untrusted: file size and path lengths are
//! bounded before parsing.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
