// crates/kfutil-core/src/runtime/eligibility.rs
// ============================================================================
// Module: Store Eligibility
// Description: Root-of-trust qualification over inventory statistics.
// Purpose: Keep leaf and key-bearing stores out of root-of-trust plans.
// Dependencies: crate::core::store
// ============================================================================

//! ## Overview
//! A store qualifies when it holds enough certificates, few enough leaf
//! certificates, and few enough private keys. Each threshold is disabled by a
//! negative value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use crate::core::store::InventoryEntry;

// ============================================================================
// SECTION: Thresholds
// ============================================================================

/// Threshold value that disables a check.
pub const DISABLED: i64 = -1;

/// Tunable eligibility thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Minimum certificate count.
    pub min_certs: i64,
    /// Maximum leaf certificate count.
    pub max_leaves: i64,
    /// Maximum private key count.
    pub max_keys: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_certs: DISABLED,
            max_leaves: DISABLED,
            max_keys: DISABLED,
        }
    }
}

// ============================================================================
// SECTION: Statistics
// ============================================================================

/// Counts derived from a store inventory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryStats {
    /// Certificates across every entry.
    pub cert_count: i64,
    /// Certificates whose subject differs from their issuer.
    pub leaf_count: i64,
    /// Entries reporting a private key.
    pub key_count: i64,
}

impl fmt::Display for InventoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} certificates, {} leaf certificates, {} private keys",
            self.cert_count, self.leaf_count, self.key_count
        )
    }
}

/// Computes inventory statistics.
#[must_use]
pub fn inventory_stats(inventory: &[InventoryEntry]) -> InventoryStats {
    let mut stats = InventoryStats::default();
    for entry in inventory {
        for certificate in &entry.certificates {
            stats.cert_count += 1;
            if certificate.is_leaf() {
                stats.leaf_count += 1;
            }
        }
        if entry.has_private_key() {
            stats.key_count += 1;
        }
    }
    stats
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Outcome of an eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// Store qualifies.
    Eligible,
    /// Store was rejected for the given reason.
    Rejected(String),
}

impl Eligibility {
    /// Returns true when the store qualifies.
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Evaluates statistics against thresholds.
#[must_use]
pub fn evaluate(stats: InventoryStats, thresholds: Thresholds) -> Eligibility {
    if thresholds.min_certs >= 0 && stats.cert_count < thresholds.min_certs {
        return Eligibility::Rejected(format!(
            "{} certificates is below the minimum of {}",
            stats.cert_count, thresholds.min_certs
        ));
    }
    if thresholds.max_leaves >= 0 && stats.leaf_count > thresholds.max_leaves {
        return Eligibility::Rejected(format!(
            "{} leaf certificates exceeds the maximum of {}",
            stats.leaf_count, thresholds.max_leaves
        ));
    }
    if thresholds.max_keys >= 0 && stats.key_count > thresholds.max_keys {
        return Eligibility::Rejected(format!(
            "{} private keys exceeds the maximum of {}",
            stats.key_count, thresholds.max_keys
        ));
    }
    Eligibility::Eligible
}

/// Returns true when the inventory qualifies under the thresholds.
#[must_use]
pub fn eligible(inventory: &[InventoryEntry], thresholds: Thresholds) -> bool {
    evaluate(inventory_stats(inventory), thresholds).is_eligible()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::Value;

    use super::*;
    use crate::core::store::InventoryCertificate;
    use crate::core::store::PRIVATE_KEY_PARAMETER;

    fn entry(certs: &[(&str, &str)], key: bool) -> InventoryEntry {
        let mut parameters = BTreeMap::new();
        if key {
            parameters.insert(PRIVATE_KEY_PARAMETER.to_string(), Value::from("Yes"));
        }
        InventoryEntry {
            alias: "a".to_string(),
            certificates: certs
                .iter()
                .map(|(issued, issuer)| InventoryCertificate {
                    id: 1,
                    thumbprint: "00".repeat(20),
                    serial_number: "1".to_string(),
                    issued_dn: (*issued).to_string(),
                    issuer_dn: (*issuer).to_string(),
                })
                .collect(),
            parameters,
        }
    }

    #[test]
    fn chains_count_each_certificate() {
        let inventory = vec![entry(&[("CN=leaf", "CN=ica"), ("CN=ica", "CN=root"), ("CN=root", "CN=root")], true)];
        let stats = inventory_stats(&inventory);
        assert_eq!(
            stats,
            InventoryStats {
                cert_count: 3,
                leaf_count: 2,
                key_count: 1
            }
        );
    }

    #[test]
    fn disabled_thresholds_accept_anything() {
        assert!(eligible(&[], Thresholds::default()));
        let inventory = vec![entry(&[("CN=leaf", "CN=ica")], true)];
        assert!(eligible(&inventory, Thresholds::default()));
    }

    #[test]
    fn each_threshold_rejects_independently() {
        let inventory = vec![entry(&[("CN=leaf", "CN=ica")], true)];
        let base = Thresholds::default();
        assert!(!eligible(&inventory, Thresholds { min_certs: 2, ..base }));
        assert!(!eligible(&inventory, Thresholds { max_leaves: 0, ..base }));
        assert!(!eligible(&inventory, Thresholds { max_keys: 0, ..base }));
        assert!(eligible(&inventory, Thresholds { min_certs: 1, max_leaves: 1, max_keys: 1 }));
    }
}
