// crates/kfutil-cli/src/lib.rs
// ============================================================================
// Module: kfutil CLI Library
// Description: Shared helpers for the kfutil command-line interface.
// Purpose: Provide reusable components for the CLI binary and tests.
// Dependencies: kfutil-core, tracing-subscriber
// ============================================================================

//! ## Overview
//! This library houses the message catalog, logging setup, and the terminal
//! secret prompt. The binary entry point (`src/main.rs`) imports these helpers
//! so that all user-facing output stays consistent.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Internationalization helpers and message catalog.
pub mod i18n;
/// Logging initialization.
pub mod logging;
/// Interactive secret prompt.
pub mod prompt;
