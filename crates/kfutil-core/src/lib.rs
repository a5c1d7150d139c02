// crates/kfutil-core/src/lib.rs
// ============================================================================
// Module: kfutil Core Library
// Description: Public API surface for root-of-trust reconciliation.
// Purpose: Expose the data model, gateway contract, CSV I/O, and pipeline.
// Dependencies: crate::{core, csv, interfaces, runtime}
// ============================================================================

//! ## Overview
//! kfutil core reconciles the certificates deployed to root-of-trust stores
//! against operator-supplied add and remove lists. A run plans one action per
//! (certificate, store) pair, writes the plan as a reviewable audit CSV, and
//! applies it through a [`PlatformGateway`]. It is transport-agnostic; the
//! HTTP gateway lives in a separate crate.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod csv;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;

pub use csv::CsvError;
pub use csv::template::TemplateFormat;
pub use interfaces::CertificateQuery;
pub use interfaces::CertificateRecord;
pub use interfaces::CertificateStoreJob;
pub use interfaces::CreateStoreRequest;
pub use interfaces::GatewayError;
pub use interfaces::JobReceipt;
pub use interfaces::JobSchedule;
pub use interfaces::JobTarget;
pub use interfaces::NoPrompt;
pub use interfaces::PasswordOptions;
pub use interfaces::PlatformGateway;
pub use interfaces::SecretPrompt;
pub use interfaces::StoreFilter;
pub use interfaces::StoreRecord;
pub use interfaces::StoreTypeDescriptor;
pub use interfaces::StoreTypeProperty;
pub use runtime::AuditReport;
pub use runtime::ImportOptions;
pub use runtime::InMemoryPlatform;
pub use runtime::ReconcileReport;
pub use runtime::ReconcileSource;
pub use runtime::RotManager;
pub use runtime::RunConfig;
pub use runtime::SecretValues;
pub use runtime::Template;
pub use runtime::TemplateFilters;
pub use runtime::TemplateKind;
pub use runtime::Thresholds;
