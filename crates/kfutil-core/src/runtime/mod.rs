// crates/kfutil-core/src/runtime/mod.rs
// ============================================================================
// Module: kfutil Runtime
// Description: Pipeline stages from inventory to dispatched jobs.
// Purpose: Group eligibility, planning, reconciliation, and bulk operations.
// Dependencies: crate::core, crate::csv, crate::interfaces
// ============================================================================

//! ## Overview
//! Stages run serially on the caller's thread. Each stage returns its partial
//! result alongside an [`crate::core::ErrorList`] so callers decide whether
//! the partial result is usable.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bulk;
pub mod eligibility;
pub mod manager;
pub mod memory;
pub mod planner;
pub mod reconciler;
pub mod templates;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bulk::ExportReport;
pub use bulk::ImportOptions;
pub use bulk::ImportReport;
pub use bulk::SecretValues;
pub use eligibility::Eligibility;
pub use eligibility::InventoryStats;
pub use eligibility::Thresholds;
pub use manager::AuditReport;
pub use manager::ReconcileReport;
pub use manager::ReconcileSource;
pub use manager::RotManager;
pub use manager::RunConfig;
pub use memory::FailurePoint;
pub use memory::GatewayCall;
pub use memory::InMemoryPlatform;
pub use planner::PlanOutcome;
pub use planner::Planner;
pub use reconciler::ReconcileOutcome;
pub use reconciler::Reconciler;
pub use templates::Template;
pub use templates::TemplateFilters;
pub use templates::TemplateKind;
