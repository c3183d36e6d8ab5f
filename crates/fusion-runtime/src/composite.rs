//! The composite contract (spec.md §4.7).
//!
//! A composite is a multi-hook object the engine drives during phase 2
//! (completion), phase 4 (validation), and phase 6 (post-commit). The core
//! never constructs composites; it only calls into ones registered via
//! [`crate::Coordinator::register_composite`]. Concrete composites (a
//! selection, a bounded counter, a dictionary-with-invariant) are external
//! collaborators, out of this crate's scope (spec.md §1) — `tests/` builds
//! small ones to exercise the contract end to end.

use std::collections::HashMap;

use fusion_core::{CellId, CompositeId, DynValue, Identifier};

/// The view a composite's `complete` callback receives during phase 2:
/// `submitted` holds primaries whose cells are already in the working map,
/// `current` holds every other primary at its committed value.
#[derive(Debug, Default)]
pub struct UpdateView {
    pub submitted: HashMap<Identifier, DynValue>,
    pub current: HashMap<Identifier, DynValue>,
}

impl UpdateView {
    /// The effective value of `identifier` as this view sees it: the
    /// submitted value if present, otherwise the current one.
    #[must_use]
    pub fn get(&self, identifier: &Identifier) -> Option<&DynValue> {
        self.submitted
            .get(identifier)
            .or_else(|| self.current.get(identifier))
    }

    #[must_use]
    pub fn is_submitted(&self, identifier: &Identifier) -> bool {
        self.submitted.contains_key(identifier)
    }
}

/// Interface a multi-hook object implements to maintain cross-hook
/// invariants (spec.md §4.7). Every method here is treated by the engine as
/// a pure function of the data it is given — composites must not hide
/// mutable state in `complete`, `validate_primary`, `validate_all`, or the
/// secondary-computation callbacks (spec.md §9).
pub trait CompositeContract: Send + Sync {
    /// Stable identity used for phase-3 dedup and phase-4/6 ordering —
    /// identity-based, never structural, per spec.md §4.6 phase 3.
    fn id(&self) -> CompositeId;

    /// The fixed set of primary identifiers, set at composite creation
    /// (spec.md §4.7).
    fn primary_identifiers(&self) -> Vec<Identifier>;

    /// Resolve a primary identifier to the cell it is bound to. The engine
    /// refuses to extend the working map with cells a composite does not
    /// own (spec.md §4.7, "must never read the current value of a cell not
    /// in its binding").
    fn primary_cell(&self, identifier: &Identifier) -> Option<CellId>;

    /// Phase 2: deterministically derive any additional primaries implied
    /// by `view`. Must not create new cells.
    fn complete(&self, view: &UpdateView) -> HashMap<Identifier, DynValue>;

    /// Phase 4, first check: validate the primaries alone.
    fn validate_primary(&self, primaries: &HashMap<Identifier, DynValue>) -> Result<(), String>;

    /// Phase 4, second check, run after secondaries are (re)computed from
    /// `primaries`. Optional; defaults to always-valid.
    fn validate_all(&self, _all: &HashMap<Identifier, DynValue>) -> Result<(), String> {
        Ok(())
    }

    /// Phase 6 step (i): fires once per touched composite, after commit.
    /// May schedule external effects but must not call submit on its own
    /// cells (spec.md §4.7).
    fn after_commit(&self) {}

    /// The fixed set of secondary identifiers (spec.md §4.7). Defaults to
    /// none.
    fn secondary_identifiers(&self) -> Vec<Identifier> {
        Vec::new()
    }

    /// A pure function from the primaries to a secondary's computed value.
    fn compute_secondary(
        &self,
        _identifier: &Identifier,
        _primaries: &HashMap<Identifier, DynValue>,
    ) -> Option<DynValue> {
        None
    }
}
