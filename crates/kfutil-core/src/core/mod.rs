// crates/kfutil-core/src/core/mod.rs
// ============================================================================
// Module: kfutil Core Types
// Description: Data model shared by the root-of-trust pipeline.
// Purpose: Group identifiers, stores, actions, errors, and time helpers.
// Dependencies: crate::core::*
// ============================================================================

//! ## Overview
//! Core types are plain data. They carry no Platform access and no I/O, which
//! keeps eligibility and planning decisions testable in isolation.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod action;
pub mod errors;
pub mod identifiers;
pub mod store;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use action::Action;
pub use action::ActionCertificate;
pub use action::ActionKind;
pub use action::Plan;
pub use errors::ErrorKind;
pub use errors::ErrorList;
pub use errors::RotError;
pub use identifiers::CertificateRef;
pub use identifiers::IdentifierError;
pub use identifiers::StoreId;
pub use identifiers::StoreTypeRef;
pub use identifiers::Thumbprint;
pub use store::InventoryCertificate;
pub use store::InventoryEntry;
pub use store::TrustStore;
pub use self::time::Clock;
pub use self::time::FixedClock;
pub use self::time::SystemClock;
