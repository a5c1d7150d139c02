// crates/kfutil-core/src/runtime/reconciler.rs
// ============================================================================
// Module: Root-of-Trust Reconciler
// Description: Dispatches planned adds and removes to the Platform.
// Purpose: Apply a plan, or an edited audit artifact, one action at a time.
// Dependencies: crate::core, crate::csv::audit, crate::interfaces, tracing
// ============================================================================

//! ## Overview
//! Actions are dispatched strictly in plan order as single-store, immediate
//! jobs. No-op actions are skipped without a call. A failed action is recorded
//! and the next action proceeds; an add rejected with `Conflict` is retried
//! once. In dry-run mode each mutating action is described on the provided
//! writer and the gateway is never called.
//!
//! Removal jobs address the inventory entry by the certificate fingerprint,
//! which is the alias used when the certificate was added.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;

use time::OffsetDateTime;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::action::Action;
use crate::core::action::ActionKind;
use crate::core::errors::ErrorKind;
use crate::core::errors::ErrorList;
use crate::core::errors::RotError;
use crate::core::identifiers::CertificateRef;
use crate::core::identifiers::Thumbprint;
use crate::csv::CsvError;
use crate::csv::CsvWriter;
use crate::csv::audit::AuditRecord;
use crate::csv::audit::AuditShape;
use crate::csv::audit::AuditWriter;
use crate::interfaces::CertificateStoreJob;
use crate::interfaces::GatewayError;
use crate::interfaces::PlatformGateway;
use crate::runtime::planner::lookup_error;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Counters and errors from one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Adds dispatched, or described in dry-run.
    pub adds: usize,
    /// Removes dispatched, or described in dry-run.
    pub removes: usize,
    /// No-op actions skipped.
    pub noops: usize,
    /// Actions that failed.
    pub failures: usize,
    /// Actions successfully dispatched, in order.
    pub applied: Vec<Action>,
    /// Per-action errors.
    pub errors: ErrorList,
}

// ============================================================================
// SECTION: Audit Import
// ============================================================================

/// Rebuilds actions from audit records.
///
/// Rows with neither flag set are dropped. Rows with both flags set, or
/// without a store id, or without any certificate identifier are logged and
/// skipped. A missing `CertID` is resolved from the fingerprint, and a missing
/// fingerprint on a removal is resolved from the id.
pub fn actions_from_audit(
    gateway: &dyn PlatformGateway,
    records: &[AuditRecord],
    fallback: OffsetDateTime,
) -> (Vec<Action>, ErrorList) {
    let mut actions = Vec::new();
    let mut errors = ErrorList::new();
    for record in records {
        let Some(mut action) = record.to_action(fallback) else {
            warn!(line = record.line, "audit row sets both AddCert and RemoveCert; skipped");
            continue;
        };
        if action.kind == ActionKind::NoOp {
            continue;
        }
        if record.store_id.is_empty() {
            warn!(line = record.line, "audit row has no StoreID; skipped");
            continue;
        }
        let thumbprint = record.thumbprint.trim();
        if record.cert_id < 0 && thumbprint.is_empty() {
            warn!(line = record.line, "audit row has neither CertID nor Thumbprint; skipped");
            continue;
        }
        let needs_id = record.cert_id < 0;
        let needs_thumbprint = action.kind == ActionKind::Remove && thumbprint.is_empty();
        if needs_id || needs_thumbprint {
            let reference = if needs_id {
                match Thumbprint::parse(thumbprint) {
                    Ok(parsed) => CertificateRef::Thumbprint(parsed),
                    Err(err) => {
                        errors.push(RotError::with_subject(
                            ErrorKind::Lookup,
                            thumbprint,
                            format!("line {}: {err}", record.line),
                        ));
                        continue;
                    }
                }
            } else {
                CertificateRef::Id(record.cert_id)
            };
            match gateway.lookup_certificate(&reference) {
                Ok(found) => {
                    action.certificate.cert_id = found.id;
                    if action.certificate.thumbprint.is_empty() {
                        action.certificate.thumbprint = found.thumbprint.to_ascii_uppercase();
                    }
                }
                Err(err) => {
                    warn!(reference = %reference, error = %err, "certificate lookup failed");
                    errors.push(lookup_error(&reference, &err));
                    continue;
                }
            }
        }
        actions.push(action);
    }
    (actions, errors)
}

// ============================================================================
// SECTION: Reconciler
// ============================================================================

/// Applies actions through a gateway.
pub struct Reconciler<'a> {
    /// Platform access used for dispatch.
    gateway: &'a dyn PlatformGateway,
    /// Describe instead of dispatching.
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(gateway: &'a dyn PlatformGateway, dry_run: bool) -> Self {
        Self {
            gateway,
            dry_run,
        }
    }

    /// Applies `actions` in order; dry-run descriptions go to `report`.
    ///
    /// # Errors
    ///
    /// Returns an internal [`RotError`] when `report` cannot be written.
    /// Gateway failures are returned inside the outcome.
    pub fn apply(
        &self,
        actions: &[Action],
        report: &mut dyn Write,
    ) -> Result<ReconcileOutcome, RotError> {
        let mut outcome = ReconcileOutcome::default();
        for action in actions {
            match action.kind {
                ActionKind::NoOp => {
                    outcome.noops += 1;
                    continue;
                }
                ActionKind::Add => outcome.adds += 1,
                ActionKind::Remove => outcome.removes += 1,
            }
            if self.dry_run {
                writeln!(report, "{}", describe(action))
                    .map_err(|err| RotError::internal(format!("writing dry-run report: {err}")))?;
                continue;
            }
            match self.dispatch(action) {
                Ok(()) => outcome.applied.push(action.clone()),
                Err(err) => {
                    warn!(
                        store_id = %action.store_id,
                        thumbprint = %action.certificate.thumbprint,
                        kind = action.kind.as_str(),
                        error = %err,
                        "action failed"
                    );
                    outcome.failures += 1;
                    outcome.errors.push(apply_error(action, &err));
                }
            }
        }
        info!(
            adds = outcome.adds,
            removes = outcome.removes,
            noops = outcome.noops,
            failures = outcome.failures,
            dry_run = self.dry_run,
            "reconcile complete"
        );
        Ok(outcome)
    }

    /// Dispatches one mutating action.
    fn dispatch(&self, action: &Action) -> Result<(), GatewayError> {
        let cert_id = action.certificate.cert_id;
        let store_id = action.store_id.clone();
        match action.kind {
            ActionKind::NoOp => Ok(()),
            ActionKind::Add => {
                let job = CertificateStoreJob::add(cert_id, store_id);
                match self.gateway.add_certificate_to_stores(&job) {
                    Err(GatewayError::Conflict(message)) => {
                        debug!(store_id = %action.store_id, message, "add conflicted; retrying once");
                        self.gateway.add_certificate_to_stores(&job).map(|_| ())
                    }
                    other => other.map(|_| ()),
                }
            }
            ActionKind::Remove => {
                let job = CertificateStoreJob::remove(
                    cert_id,
                    store_id,
                    action.certificate.thumbprint.clone(),
                );
                self.gateway.remove_certificate_from_stores(&job).map(|_| ())
            }
        }
    }
}

/// Writes the reconciled artifact for every dispatched action.
///
/// # Errors
///
/// Returns an internal [`RotError`] when the artifact cannot be written.
pub fn write_reconciled<W: Write>(
    outcome: &ReconcileOutcome,
    csv: CsvWriter<W>,
    reconciled_at: OffsetDateTime,
) -> Result<W, RotError> {
    let to_internal = |err: CsvError| RotError::internal(format!("writing reconciled csv: {err}"));
    let mut writer = AuditWriter::new(csv, AuditShape::Reconciled).map_err(to_internal)?;
    for action in &outcome.applied {
        writer.write_record(&AuditRecord::from_action(action), reconciled_at).map_err(to_internal)?;
    }
    Ok(writer.into_inner())
}

/// Describes an action for dry-run output.
#[must_use]
pub fn describe(action: &Action) -> String {
    let (verb, preposition) = match action.kind {
        ActionKind::Add => ("add", "to"),
        ActionKind::Remove => ("remove", "from"),
        ActionKind::NoOp => ("leave", "in"),
    };
    format!(
        "[dry-run] would {verb} {} {preposition} {} ({} {})",
        action.certificate.thumbprint, action.store_id, action.machine, action.store_path
    )
}

/// Classifies a failed dispatch.
fn apply_error(action: &Action, err: &GatewayError) -> RotError {
    let kind = match err {
        GatewayError::Transport(_) | GatewayError::Unauthorized(_) => ErrorKind::Transport,
        _ => ErrorKind::Apply,
    };
    RotError::with_subject(
        kind,
        format!("{} {}", action.certificate.thumbprint, action.store_id),
        format!("{} failed: {err}", action.kind.as_str()),
    )
}
