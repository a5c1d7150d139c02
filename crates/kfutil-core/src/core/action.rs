// crates/kfutil-core/src/core/action.rs
// ============================================================================
// Module: Reconciliation Actions
// Description: Decision records for (certificate, store) pairs and plans.
// Purpose: Represent the planner output consumed by the reconciler.
// Dependencies: time
// ============================================================================

//! ## Overview
//! An [`Action`] records one decision for a certificate against one store. The
//! decision is an [`ActionKind`], so "add and remove at once" cannot be
//! represented. A [`Plan`] is the ordered list of actions; rows are kept even
//! when nothing needs to change so that audit artifacts diff cleanly between
//! runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

use crate::core::identifiers::StoreId;
use crate::core::store::TrustStore;

// ============================================================================
// SECTION: Action
// ============================================================================

/// Decision recorded for a (certificate, store) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Certificate must be added to the store.
    Add,
    /// Certificate must be removed from the store.
    Remove,
    /// Certificate is already in the desired state.
    NoOp,
}

impl ActionKind {
    /// Builds a kind from the audit `AddCert` / `RemoveCert` flags.
    ///
    /// Returns `None` when both flags are set.
    #[must_use]
    pub const fn from_flags(add: bool, remove: bool) -> Option<Self> {
        match (add, remove) {
            (true, true) => None,
            (true, false) => Some(Self::Add),
            (false, true) => Some(Self::Remove),
            (false, false) => Some(Self::NoOp),
        }
    }

    /// Returns the stable lower-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::NoOp => "no-op",
        }
    }
}

/// Certificate fields copied into an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCertificate {
    /// Upper-case fingerprint.
    pub thumbprint: String,
    /// Platform certificate id, `-1` when unresolved.
    pub cert_id: i64,
    /// Subject distinguished name.
    pub subject_dn: String,
    /// Issuer distinguished name.
    pub issuer_dn: String,
}

/// One planned decision.
///
/// # Invariants
/// - `kind == Remove` implies the certificate was deployed when planned.
/// - `deployed && kind != Remove` implies `kind == NoOp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Certificate the action concerns.
    pub certificate: ActionCertificate,
    /// Target store id.
    pub store_id: StoreId,
    /// Target store type short name.
    pub store_type: String,
    /// Target store path.
    pub store_path: String,
    /// Target client machine.
    pub machine: String,
    /// Planned decision.
    pub kind: ActionKind,
    /// Whether the certificate was present when planned.
    pub deployed: bool,
    /// Planning timestamp.
    pub audit_timestamp: OffsetDateTime,
}

impl Action {
    /// Builds an action for a certificate against a store.
    #[must_use]
    pub fn for_store(
        certificate: ActionCertificate,
        store: &TrustStore,
        kind: ActionKind,
        deployed: bool,
        audit_timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            certificate,
            store_id: store.store_id.clone(),
            store_type: store.store_type.clone(),
            store_path: store.store_path.clone(),
            machine: store.client_machine.clone(),
            kind,
            deployed,
            audit_timestamp,
        }
    }

    /// Returns true when the action requests an add.
    #[must_use]
    pub fn is_add(&self) -> bool {
        self.kind == ActionKind::Add
    }

    /// Returns true when the action requests a removal.
    #[must_use]
    pub fn is_remove(&self) -> bool {
        self.kind == ActionKind::Remove
    }

    /// Returns true when no Platform call is needed.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.kind == ActionKind::NoOp
    }
}

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Ordered sequence of actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Actions in planning order.
    actions: Vec<Action>,
}

impl Plan {
    /// Creates an empty plan.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Appends an action.
    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Returns the actions in order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Returns the number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true when the plan has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of add actions.
    #[must_use]
    pub fn add_count(&self) -> usize {
        self.actions.iter().filter(|action| action.is_add()).count()
    }

    /// Returns the number of remove actions.
    #[must_use]
    pub fn remove_count(&self) -> usize {
        self.actions.iter().filter(|action| action.is_remove()).count()
    }

    /// Returns true when every action is a no-op.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.actions.iter().all(Action::is_noop)
    }
}

impl From<Vec<Action>> for Plan {
    fn from(actions: Vec<Action>) -> Self {
        Self {
            actions,
        }
    }
}

impl IntoIterator for Plan {
    type Item = Action;
    type IntoIter = std::vec::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}
