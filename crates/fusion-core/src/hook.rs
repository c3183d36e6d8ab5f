//! Hook storage: the connection-point data a [`crate::cell::CellRecord`]
//! is referenced by (spec.md §3, §4.3).
//!
//! The write-path operations (`submit`, `join`, `isolate`) need the
//! coordinator's lock and so live on the public `Hook<T>` handle in
//! `fusion-runtime`; this module only holds the data a hook carries.

use std::sync::{Arc, Weak};

use crate::ids::{CellId, CompositeId, HookId, Identifier, ListenerId};
use crate::value::DynValue;

/// A pure, deterministic, side-effect-free predicate on a proposed value
/// (spec.md §4.3 "Validator contract").
pub type ValidatorFn = Arc<dyn Fn(&DynValue) -> Result<(), String> + Send + Sync>;

/// An argument-less post-commit callback. Used for both listeners and a
/// hook's single `reaction_callback` (spec.md §9: "Listeners are
/// argument-less because their value source is the hook they are attached
/// to").
pub type ReactionFn = Arc<dyn Fn() + Send + Sync>;

/// The weak counterpart of [`ReactionFn`] a hook's listener list actually
/// stores. The strong `Arc` is held by the `Subscription` guard
/// `fusion_runtime::Hook::add_listener` hands back to the caller — the same
/// split the teacher's `Observable` makes between `CallbackRc<T>` (held by
/// `Subscription`) and `CallbackWeak<T>` (held by the observable itself), so
/// a hook's own listener list can never keep its arena's `Coordinator`
/// artificially alive.
pub type WeakReactionFn = Weak<dyn Fn() + Send + Sync>;

/// Where an owned hook sits inside its composite (spec.md §3 "Composite
/// binding"): a local identifier, and whether this hook exposes a
/// user-facing write path (primaries are writable; secondaries are
/// read-only, computed deterministically from primaries).
#[derive(Clone)]
pub struct CompositeBinding {
    pub composite: CompositeId,
    pub identifier: Identifier,
    pub writable: bool,
}

impl std::fmt::Debug for CompositeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeBinding")
            .field("composite", &self.composite)
            .field("identifier", &self.identifier)
            .field("writable", &self.writable)
            .finish()
    }
}

/// A connection point: references exactly one cell at all times.
///
/// A hook is exactly one of *floating* (`composite_binding` is `None`) or
/// *owned* (spec.md §4.3); capability is a field, not a type hierarchy, per
/// the design note in spec.md §9 ("implement as a tagged record ... Do not
/// model them with deep inheritance").
pub struct HookRecord {
    id: HookId,
    cell: CellId,
    listeners: Vec<(ListenerId, WeakReactionFn)>,
    isolated_validator: Option<ValidatorFn>,
    reaction_callback: Option<ReactionFn>,
    composite_binding: Option<CompositeBinding>,
}

impl HookRecord {
    #[must_use]
    pub fn new(cell: CellId) -> Self {
        Self {
            id: HookId::next(),
            cell,
            listeners: Vec::new(),
            isolated_validator: None,
            reaction_callback: None,
            composite_binding: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> HookId {
        self.id
    }

    #[must_use]
    pub const fn cell(&self) -> CellId {
        self.cell
    }

    pub fn set_cell(&mut self, cell: CellId) {
        self.cell = cell;
    }

    #[must_use]
    pub fn validator(&self) -> Option<&ValidatorFn> {
        self.isolated_validator.as_ref()
    }

    pub fn set_validator(&mut self, validator: Option<ValidatorFn>) {
        self.isolated_validator = validator;
    }

    #[must_use]
    pub fn reaction_callback(&self) -> Option<&ReactionFn> {
        self.reaction_callback.as_ref()
    }

    pub fn set_reaction_callback(&mut self, callback: Option<ReactionFn>) {
        self.reaction_callback = callback;
    }

    #[must_use]
    pub fn composite_binding(&self) -> Option<&CompositeBinding> {
        self.composite_binding.as_ref()
    }

    pub fn set_composite_binding(&mut self, binding: Option<CompositeBinding>) {
        self.composite_binding = binding;
    }

    #[must_use]
    pub const fn is_floating(&self) -> bool {
        self.composite_binding.is_none()
    }

    /// Duplicate adds of the exact same listener token are not meaningful
    /// here (each `add_listener` call mints a fresh [`ListenerId`]); the
    /// idempotency spec.md §4.3 describes is realized at the `Hook<T>`
    /// handle, which hands back the same token on a repeated identical
    /// registration. See `fusion-runtime`'s `Hook::add_listener`.
    pub fn push_listener(&mut self, id: ListenerId, callback: WeakReactionFn) {
        self.listeners.push((id, callback));
    }

    /// Removing an absent listener is a silent no-op (spec.md §4.3).
    pub fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(existing, _)| *existing != id);
    }

    /// Listeners in insertion order (spec.md §4.3, §4.6 phase 6 step iv),
    /// still weak and possibly dead — use [`Self::prune_and_collect_listeners`]
    /// to fire them.
    #[must_use]
    pub fn listeners(&self) -> &[(ListenerId, WeakReactionFn)] {
        &self.listeners
    }

    /// Drop dead weak entries and upgrade the rest to strong callbacks, in
    /// insertion order — the teacher's `Observable::notify` pruning pattern
    /// (`retain` on `strong_count() > 0`, then `filter_map(Weak::upgrade)`),
    /// run lazily right before a hook's listeners fire (spec.md §4.6 phase 6
    /// step iv).
    pub fn prune_and_collect_listeners(&mut self) -> Vec<(ListenerId, ReactionFn)> {
        self.listeners.retain(|(_, weak)| weak.strong_count() > 0);
        self.listeners
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|cb| (*id, cb)))
            .collect()
    }
}

impl std::fmt::Debug for HookRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRecord")
            .field("id", &self.id)
            .field("cell", &self.cell)
            .field("listener_count", &self.listeners.len())
            .field("has_validator", &self.isolated_validator.is_some())
            .field("has_reaction_callback", &self.reaction_callback.is_some())
            .field("composite_binding", &self.composite_binding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_hook_is_floating() {
        let cell = CellId::next();
        let hook = HookRecord::new(cell);
        assert!(hook.is_floating());
        assert_eq!(hook.cell(), cell);
    }

    #[test]
    fn listener_remove_is_no_op_when_absent() {
        let mut hook = HookRecord::new(CellId::next());
        hook.remove_listener(ListenerId::next());
        assert!(hook.listeners().is_empty());
    }

    #[test]
    fn listeners_preserve_insertion_order() {
        let mut hook = HookRecord::new(CellId::next());
        let a = ListenerId::next();
        let b = ListenerId::next();
        let cb_a: ReactionFn = Arc::new(|| {});
        let cb_b: ReactionFn = Arc::new(|| {});
        hook.push_listener(a, Arc::downgrade(&cb_a));
        hook.push_listener(b, Arc::downgrade(&cb_b));
        let ids: Vec<_> = hook.prune_and_collect_listeners().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn dead_listener_is_pruned_on_collect() {
        let mut hook = HookRecord::new(CellId::next());
        let id = ListenerId::next();
        let cb: ReactionFn = Arc::new(|| {});
        hook.push_listener(id, Arc::downgrade(&cb));
        drop(cb);
        assert_eq!(hook.listeners().len(), 1, "dead entry not yet pruned");
        assert!(hook.prune_and_collect_listeners().is_empty());
        assert!(hook.listeners().is_empty(), "collect prunes the dead entry");
    }
}
