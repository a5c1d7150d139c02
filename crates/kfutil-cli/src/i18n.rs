// crates/kfutil-cli/src/i18n.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: Message catalog and placeholder substitution for CLI output.
// Purpose: Keep every user-facing string in one table.
// Dependencies: Standard library collections.
// ============================================================================

//! ## Overview
//! All runtime output of the `kfutil` binary is routed through the
//! [`t!`](crate::t) macro so that wording stays consistent across commands.
//!
//! ## Invariants
//! - The catalog is built on first use and never mutated.
//! - Missing keys fall back to the key itself.
//! - Placeholders are substituted in argument order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// Placeholder name used in message templates, e.g. `"path"`.
    pub key: &'static str,
    /// Value substituted for the placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`].
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static English catalog.
const CATALOG_ITEMS: &[(&str, &str)] = &[
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("config.load_failed", "Failed to load connection profile: {error}"),
    ("gateway.init_failed", "Failed to initialize Platform client: {error}"),
    ("run.error", "error: {error}"),
    ("run.failed", "{error}"),
    (
        "rot.audit.summary",
        "Audit complete: {rows} action(s) planned ({adds} add, {removes} remove) across {stores} \
         store(s), {rejected} rejected; written to {path}",
    ),
    (
        "rot.reconcile.summary",
        "Reconcile complete: {adds} add(s), {removes} remove(s), {noops} no-op(s), {failures} \
         failure(s); audit {audit}; reconciled {reconciled}",
    ),
    ("rot.reconcile.not_written", "not written (dry-run)"),
    ("rot.audit.dry_run_ignored", "note: audit never changes stores; --dry-run has no effect"),
    ("rot.template.invalid_store_type", "Invalid store type {value}: {error}"),
    ("template.written", "Template written to {path} ({rows} row(s))"),
    ("stores.import.summary", "Import complete: {created} created, {failed} failed; results written to {path}"),
    ("stores.export.summary", "Exported {rows} store(s) to {path}"),
    ("prompt.secret", "Enter {label}: "),
];

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates `key` using the English catalog while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).map_or(key, |message| *message);
    args.into_iter().fold(template.to_string(), |message, arg| {
        message.replace(&format!("{{{}}}", arg.key), &arg.value)
    })
}

/// Returns the static English catalog.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

    CATALOG.get_or_init(|| CATALOG_ITEMS.iter().copied().collect())
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a catalog message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_substituted() {
        let message = crate::t!("stores.export.summary", rows = 3, path = "out.csv");
        assert_eq!(message, "Exported 3 store(s) to out.csv");
    }

    #[test]
    fn unknown_keys_fall_back_to_the_key() {
        assert_eq!(translate("no.such.key", Vec::new()), "no.such.key");
    }

    #[test]
    fn catalog_keys_are_unique() {
        assert_eq!(catalog().len(), CATALOG_ITEMS.len());
    }
}
