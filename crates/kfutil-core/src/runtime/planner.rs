// crates/kfutil-core/src/runtime/planner.rs
// ============================================================================
// Module: Root-of-Trust Planner
// Description: Desired certificates times observed stores into an action plan.
// Purpose: Produce the audit artifact row by row as decisions are made.
// Dependencies: crate::core, crate::csv::audit, crate::interfaces, tracing
// ============================================================================

//! ## Overview
//! The planner resolves every certificate reference through the gateway, then
//! emits exactly one action per (certificate, eligible store) pair. Add
//! references come first in input order, then remove references, each fanned
//! out in store order. Every row is written to the audit sink as soon as it is
//! decided, so an interrupted run leaves a valid partial artifact.
//!
//! A certificate listed for both add and remove is planned as a removal only.
//! Lookup failures are recorded per reference and never abort the batch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashSet;
use std::io::Write;

use time::OffsetDateTime;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::action::Action;
use crate::core::action::ActionCertificate;
use crate::core::action::ActionKind;
use crate::core::action::Plan;
use crate::core::errors::ErrorKind;
use crate::core::errors::ErrorList;
use crate::core::errors::RotError;
use crate::core::identifiers::CertificateRef;
use crate::core::identifiers::normalize_thumbprint;
use crate::core::store::TrustStore;
use crate::csv::audit::AuditWriter;
use crate::interfaces::CertificateRecord;
use crate::interfaces::GatewayError;
use crate::interfaces::PlatformGateway;

// ============================================================================
// SECTION: Lookup Helpers
// ============================================================================

/// Classifies a failed certificate lookup.
pub(crate) fn lookup_error(reference: &CertificateRef, err: &GatewayError) -> RotError {
    let kind = if err.is_not_found() { ErrorKind::Lookup } else { ErrorKind::Transport };
    RotError::with_subject(kind, reference.to_string(), err.to_string())
}

/// Copies the fields an action needs from a certificate record.
pub(crate) fn action_certificate(record: &CertificateRecord) -> ActionCertificate {
    ActionCertificate {
        thumbprint: normalize_thumbprint(&record.thumbprint),
        cert_id: record.id,
        subject_dn: record.issued_dn.clone(),
        issuer_dn: record.issuer_dn.clone(),
    }
}

/// Drops add references that also appear verbatim in the remove list.
///
/// Runs before any add-side lookup, so a removal whose own lookup failed still
/// keeps the certificate out of the add set.
fn without_removed_references(
    add: &[CertificateRef],
    remove: &[CertificateRef],
) -> Vec<CertificateRef> {
    let removed: HashSet<&CertificateRef> = remove.iter().collect();
    add.iter()
        .filter(|reference| {
            let listed = removed.contains(reference);
            if listed {
                warn!(
                    reference = %reference,
                    "certificate listed for both add and remove; planning removal only"
                );
            }
            !listed
        })
        .cloned()
        .collect()
}

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Result of a planning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Planned actions in artifact order.
    pub plan: Plan,
    /// Per-reference lookup errors.
    pub errors: ErrorList,
}

/// Builds plans against a gateway.
pub struct Planner<'a> {
    /// Platform access used for certificate lookups.
    gateway: &'a dyn PlatformGateway,
    /// Timestamp stamped on every row of the plan.
    timestamp: OffsetDateTime,
}

impl<'a> Planner<'a> {
    /// Creates a planner that stamps rows with `timestamp`.
    #[must_use]
    pub fn new(gateway: &'a dyn PlatformGateway, timestamp: OffsetDateTime) -> Self {
        Self {
            gateway,
            timestamp,
        }
    }

    /// Plans `add` and `remove` against `stores`, streaming rows into `sink`.
    ///
    /// `stores` must already be filtered for eligibility and have their
    /// inventories loaded.
    ///
    /// # Errors
    ///
    /// Returns an internal [`RotError`] when the audit sink fails. Lookup
    /// failures are returned inside the outcome instead.
    pub fn plan<W: Write>(
        &self,
        stores: &[TrustStore],
        add: &[CertificateRef],
        remove: &[CertificateRef],
        sink: &mut AuditWriter<W>,
    ) -> Result<PlanOutcome, RotError> {
        let mut outcome = PlanOutcome::default();
        info!(
            stores = stores.len(),
            add = add.len(),
            remove = remove.len(),
            "planning root-of-trust changes"
        );

        let removals = self.resolve(remove, &BTreeSet::new(), &mut outcome.errors);
        let add = without_removed_references(add, remove);
        let removal_ids: BTreeSet<i64> = removals.iter().map(|record| record.id).collect();
        let additions = self.resolve(&add, &removal_ids, &mut outcome.errors);

        for record in &additions {
            let certificate = action_certificate(record);
            for store in stores {
                let deployed = store.contains_thumbprint(&certificate.thumbprint);
                let kind = if deployed { ActionKind::NoOp } else { ActionKind::Add };
                self.emit(&mut outcome.plan, sink, certificate.clone(), store, kind, deployed)?;
            }
        }
        for record in &removals {
            let certificate = action_certificate(record);
            for store in stores {
                let deployed = store.contains_thumbprint(&certificate.thumbprint);
                let kind = if deployed { ActionKind::Remove } else { ActionKind::NoOp };
                self.emit(&mut outcome.plan, sink, certificate.clone(), store, kind, deployed)?;
            }
        }

        info!(
            rows = outcome.plan.len(),
            adds = outcome.plan.add_count(),
            removes = outcome.plan.remove_count(),
            errors = outcome.errors.len(),
            "plan complete"
        );
        Ok(outcome)
    }

    /// Resolves references in order, dropping duplicates and `excluded` ids.
    fn resolve(
        &self,
        references: &[CertificateRef],
        excluded: &BTreeSet<i64>,
        errors: &mut ErrorList,
    ) -> Vec<CertificateRecord> {
        let mut seen = BTreeSet::new();
        let mut resolved = Vec::with_capacity(references.len());
        for reference in references {
            let record = match self.gateway.lookup_certificate(reference) {
                Ok(record) => record,
                Err(err) => {
                    warn!(reference = %reference, error = %err, "certificate lookup failed");
                    errors.push(lookup_error(reference, &err));
                    continue;
                }
            };
            if excluded.contains(&record.id) {
                warn!(
                    reference = %reference,
                    cert_id = record.id,
                    "certificate listed for both add and remove; planning removal only"
                );
                continue;
            }
            if !seen.insert(record.id) {
                debug!(reference = %reference, cert_id = record.id, "duplicate certificate skipped");
                continue;
            }
            resolved.push(record);
        }
        resolved
    }

    /// Records one action and writes it to the sink.
    fn emit<W: Write>(
        &self,
        plan: &mut Plan,
        sink: &mut AuditWriter<W>,
        certificate: ActionCertificate,
        store: &TrustStore,
        kind: ActionKind,
        deployed: bool,
    ) -> Result<(), RotError> {
        let action = Action::for_store(certificate, store, kind, deployed, self.timestamp);
        sink.write_action(&action)
            .map_err(|err| RotError::internal(format!("writing audit row: {err}")))?;
        plan.push(action);
        Ok(())
    }
}
