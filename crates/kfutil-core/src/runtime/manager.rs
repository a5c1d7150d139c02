// crates/kfutil-core/src/runtime/manager.rs
// ============================================================================
// Module: Root-of-Trust Manager
// Description: Facade wiring CSV inputs, eligibility, planning, and apply.
// Purpose: Provide the audit and reconcile entry points over a run config.
// Dependencies: crate::core, crate::csv, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! [`RotManager`] owns a [`RunConfig`] and a gateway handle. Every input CSV
//! is parsed before the first gateway call, so a malformed input fails with
//! an input error and no artifact. After that point, per-store and
//! per-certificate failures are accumulated and the run carries on; the audit
//! artifact is always fully written and flushed before any dispatch begins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing::warn;

use crate::core::action::Plan;
use crate::core::errors::ErrorKind;
use crate::core::errors::ErrorList;
use crate::core::errors::RotError;
use crate::core::identifiers::CertificateRef;
use crate::core::identifiers::StoreId;
use crate::core::identifiers::StoreTypeRef;
use crate::core::store::TrustStore;
use crate::core::time::Clock;
use crate::core::time::SystemClock;
use crate::core::time::format_rfc3339;
use crate::csv::audit::AuditShape;
use crate::csv::audit::AuditWriter;
use crate::csv::audit::read_audit_csv;
use crate::csv::certs::read_certificates_csv;
use crate::csv::create_file;
use crate::csv::stores::StoreRow;
use crate::csv::stores::read_stores_csv;
use crate::interfaces::GatewayError;
use crate::interfaces::PlatformGateway;
use crate::runtime::eligibility::Eligibility;
use crate::runtime::eligibility::Thresholds;
use crate::runtime::eligibility::evaluate;
use crate::runtime::eligibility::inventory_stats;
use crate::runtime::planner::Planner;
use crate::runtime::reconciler::ReconcileOutcome;
use crate::runtime::reconciler::Reconciler;
use crate::runtime::reconciler::actions_from_audit;
use crate::runtime::reconciler::write_reconciled;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default audit artifact path.
pub const DEFAULT_AUDIT_PATH: &str = "rot_audit.csv";

/// Suffix appended to the audit stem for the reconciled artifact.
const RECONCILED_SUFFIX: &str = "_reconciled";

// ============================================================================
// SECTION: Run Config
// ============================================================================

/// Immutable configuration for one run.
#[derive(Clone)]
pub struct RunConfig {
    /// Stores CSV.
    pub stores_path: Option<PathBuf>,
    /// Certificates to add.
    pub add_certs_path: Option<PathBuf>,
    /// Certificates to remove.
    pub remove_certs_path: Option<PathBuf>,
    /// Audit artifact written by `audit`.
    pub audit_path: PathBuf,
    /// Reconciled artifact; derived from the plan source when unset.
    pub reconciled_path: Option<PathBuf>,
    /// Eligibility thresholds.
    pub thresholds: Thresholds,
    /// Describe instead of dispatching.
    pub dry_run: bool,
    /// Time source for artifact timestamps.
    pub clock: Arc<dyn Clock>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stores_path: None,
            add_certs_path: None,
            remove_certs_path: None,
            audit_path: PathBuf::from(DEFAULT_AUDIT_PATH),
            reconciled_path: None,
            thresholds: Thresholds::default(),
            dry_run: false,
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("stores_path", &self.stores_path)
            .field("add_certs_path", &self.add_certs_path)
            .field("remove_certs_path", &self.remove_certs_path)
            .field("audit_path", &self.audit_path)
            .field("reconciled_path", &self.reconciled_path)
            .field("thresholds", &self.thresholds)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

/// Returns `<stem>_reconciled.csv` next to `path`.
#[must_use]
pub fn reconciled_path_for(path: &Path) -> PathBuf {
    let stem = path.file_stem().map_or_else(|| "rot_audit".into(), |stem| stem.to_string_lossy());
    path.with_file_name(format!("{stem}{RECONCILED_SUFFIX}.csv"))
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Result of an audit run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Planned actions.
    pub plan: Plan,
    /// Stores that passed eligibility, in input order.
    pub eligible: Vec<StoreId>,
    /// Stores rejected by eligibility with the reason.
    pub rejected: Vec<(StoreId, String)>,
    /// Audit artifact path.
    pub audit_path: PathBuf,
    /// Accumulated errors, including eligibility rejections.
    pub errors: ErrorList,
}

/// Where reconcile takes its actions from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileSource {
    /// Run `audit` first and apply the fresh plan.
    FromPlan,
    /// Apply a previously written, possibly edited, audit artifact.
    FromFile(PathBuf),
}

/// Result of a reconcile run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Audit report when the plan was produced in this run.
    pub audit: Option<AuditReport>,
    /// Dispatch counters.
    pub outcome: ReconcileOutcome,
    /// Reconciled artifact path; `None` in dry-run.
    pub reconciled_path: Option<PathBuf>,
    /// Every error from every stage.
    pub errors: ErrorList,
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Root-of-trust facade.
pub struct RotManager<'a> {
    /// Run configuration.
    config: RunConfig,
    /// Platform access.
    gateway: &'a dyn PlatformGateway,
}

impl<'a> RotManager<'a> {
    /// Creates a manager.
    #[must_use]
    pub fn new(config: RunConfig, gateway: &'a dyn PlatformGateway) -> Self {
        Self {
            config,
            gateway,
        }
    }

    /// Returns the run configuration.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Plans the configured changes and writes the audit artifact.
    ///
    /// # Errors
    ///
    /// Returns an input [`RotError`] when a CSV is missing or malformed, or an
    /// internal error when the audit artifact cannot be written.
    pub fn audit(&self) -> Result<AuditReport, RotError> {
        let stores_path = self
            .config
            .stores_path
            .as_deref()
            .ok_or_else(|| RotError::input("a stores CSV is required"))?;
        if self.config.add_certs_path.is_none() && self.config.remove_certs_path.is_none() {
            return Err(RotError::input(
                "at least one of the add or remove certificate lists is required",
            ));
        }
        let rows = read_stores_csv(stores_path)?;
        let add = read_optional_certificates(self.config.add_certs_path.as_deref())?;
        let remove = read_optional_certificates(self.config.remove_certs_path.as_deref())?;

        let mut report = AuditReport {
            audit_path: self.config.audit_path.clone(),
            ..AuditReport::default()
        };
        let now = self.config.clock.now();
        let stores = self.load_stores(rows, &format_rfc3339(now), &mut report);

        let csv = create_file(&self.config.audit_path)
            .map_err(|err| RotError::internal(format!("creating audit csv: {err}")))?;
        let mut sink = AuditWriter::new(csv, AuditShape::Audit)
            .map_err(|err| RotError::internal(format!("writing audit header: {err}")))?;
        let outcome = Planner::new(self.gateway, now).plan(&stores, &add, &remove, &mut sink)?;
        report.plan = outcome.plan;
        report.errors.extend(outcome.errors);
        info!(
            path = %self.config.audit_path.display(),
            rows = report.plan.len(),
            "audit artifact written"
        );
        Ok(report)
    }

    /// Applies a plan and writes the reconciled artifact.
    ///
    /// # Errors
    ///
    /// Returns an input [`RotError`] when an input file is malformed, or an
    /// internal error when an artifact cannot be written.
    pub fn reconcile(
        &self,
        source: &ReconcileSource,
        report: &mut dyn Write,
    ) -> Result<ReconcileReport, RotError> {
        let mut result = ReconcileReport::default();
        let (actions, default_reconciled) = match source {
            ReconcileSource::FromPlan => {
                let audit = self.audit()?;
                let actions = audit.plan.actions().to_vec();
                result.errors.extend(audit.errors.clone());
                result.audit = Some(audit);
                (actions, reconciled_path_for(&self.config.audit_path))
            }
            ReconcileSource::FromFile(path) => {
                let records = read_audit_csv(path)?;
                let (actions, errors) =
                    actions_from_audit(self.gateway, &records, self.config.clock.now());
                result.errors.extend(errors);
                (actions, reconciled_path_for(path))
            }
        };

        let outcome = Reconciler::new(self.gateway, self.config.dry_run).apply(&actions, report)?;
        if !self.config.dry_run {
            let path = self.config.reconciled_path.clone().unwrap_or(default_reconciled);
            let csv = create_file(&path)
                .map_err(|err| RotError::internal(format!("creating reconciled csv: {err}")))?;
            write_reconciled(&outcome, csv, self.config.clock.now())?;
            info!(path = %path.display(), rows = outcome.applied.len(), "reconciled artifact written");
            result.reconciled_path = Some(path);
        }
        result.errors.extend(outcome.errors.clone());
        result.outcome = outcome;
        Ok(result)
    }

    /// Refreshes each listed store from the Platform and filters eligibility.
    fn load_stores(
        &self,
        rows: Vec<StoreRow>,
        queried_at: &str,
        report: &mut AuditReport,
    ) -> Vec<TrustStore> {
        let mut type_names: BTreeMap<i64, String> = BTreeMap::new();
        let mut stores = Vec::with_capacity(rows.len());
        for row in rows {
            let store_id = row.store_id.clone();
            let Some(store) = self.load_store(row, queried_at, &mut type_names, &mut report.errors)
            else {
                continue;
            };
            let stats = inventory_stats(store.inventory());
            match evaluate(stats, self.config.thresholds) {
                Eligibility::Eligible => {
                    report.eligible.push(store_id);
                    stores.push(store);
                }
                Eligibility::Rejected(reason) => {
                    info!(
                        store_id = %store_id,
                        %stats,
                        reason = reason.as_str(),
                        "store rejected by eligibility"
                    );
                    report.errors.push(RotError::with_subject(
                        ErrorKind::Eligibility,
                        store_id.to_string(),
                        reason.clone(),
                    ));
                    report.rejected.push((store_id, reason));
                }
            }
        }
        stores
    }

    /// Loads one store and its inventory; failures are recorded and skip it.
    fn load_store(
        &self,
        row: StoreRow,
        queried_at: &str,
        type_names: &mut BTreeMap<i64, String>,
        errors: &mut ErrorList,
    ) -> Option<TrustStore> {
        let store_id = row.store_id.clone();
        let record = match self.gateway.get_store(&store_id) {
            Ok(record) => record,
            Err(err) => {
                warn!(store_id = %store_id, error = %err, "store lookup failed");
                errors.push(store_error(&store_id, &err));
                return None;
            }
        };
        let inventory = match self.gateway.get_store_inventory(&store_id) {
            Ok(inventory) => inventory,
            Err(err) => {
                warn!(store_id = %store_id, error = %err, "inventory fetch failed");
                errors.push(store_error(&store_id, &err));
                return None;
            }
        };

        let csv_type = row.store_type.clone();
        let mut store = row.into_trust_store();
        store.store_type = if record.store_type.is_empty() {
            self.store_type_name(record.store_type_id, type_names).unwrap_or(csv_type)
        } else {
            record.store_type
        };
        store.client_machine = record.client_machine;
        store.store_path = record.store_path;
        store.container_id = record.container_id.filter(|id| *id != 0);
        store.container_name = record.container_name;
        store.last_queried = queried_at.to_string();
        store.set_inventory(inventory);
        Some(store)
    }

    /// Resolves a store type short name, caching by id.
    fn store_type_name(&self, id: i64, cache: &mut BTreeMap<i64, String>) -> Option<String> {
        if let Some(name) = cache.get(&id) {
            return Some(name.clone());
        }
        match self.gateway.get_store_type(&StoreTypeRef::Id(id)) {
            Ok(descriptor) => {
                cache.insert(id, descriptor.short_name.clone());
                Some(descriptor.short_name)
            }
            Err(err) => {
                warn!(store_type_id = id, error = %err, "store type lookup failed");
                None
            }
        }
    }
}

/// Reads an optional certificate list.
fn read_optional_certificates(path: Option<&Path>) -> Result<Vec<CertificateRef>, RotError> {
    path.map_or_else(|| Ok(Vec::new()), |path| read_certificates_csv(path).map_err(RotError::from))
}

/// Classifies a failed store fetch.
fn store_error(store_id: &StoreId, err: &GatewayError) -> RotError {
    let kind = match err {
        GatewayError::Transport(_) | GatewayError::Unauthorized(_) => ErrorKind::Transport,
        _ => ErrorKind::Lookup,
    };
    RotError::with_subject(kind, store_id.to_string(), err.to_string())
}
