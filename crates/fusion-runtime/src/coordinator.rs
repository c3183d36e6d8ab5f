//! The Coordinator: one global serializer per manager instance (spec.md §4.4).
//!
//! Holds the reentrant lock that guards the whole submission pipeline and
//! every fusion-op structural mutation, the equality registry, and the
//! arena of live cells/hooks/composites. Generalizes the teacher's
//! single-threaded `Rc<RefCell<_>>` runtime (`ftui-runtime::reactive`) to
//! the thread-safe equivalent the spec requires, grounded in
//! `isoprenoid::runtime::signal_runtime::ASignalRuntime`'s
//! `ReentrantMutex<RefCell<..>>` interior.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use fusion_core::{
    CellId, CellRecord, CellSnapshot, CompositeBinding, CompositeId, DynValue, EngineId,
    EqualityRegistry, FusionResult, HookId, HookRecord, ReactionFn, ValidatorFn, WeakReactionFn,
};

use crate::composite::CompositeContract;
use crate::publisher::PublisherCollaborator;
use crate::reentrancy::ReentrancyGuard;
use crate::state::CoordinatorState;
use crate::submission::{self, SubmissionMode};

const DEFAULT_ROUND_CAP: usize = 64;

/// Builder for a [`Coordinator`], exposing the two knobs spec.md §9 leaves
/// implementation-defined: the phase-2 round cap and the equality
/// registry's tolerance.
pub struct CoordinatorBuilder {
    tolerance: f64,
    round_cap: usize,
}

impl CoordinatorBuilder {
    fn new() -> Self {
        Self {
            tolerance: 0.0,
            round_cap: DEFAULT_ROUND_CAP,
        }
    }

    /// Scalar tolerance threaded through to registered equality comparators
    /// (spec.md §3 "Equality policy").
    #[must_use]
    pub const fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Phase-2 fixed-point round cap before *CompletionDivergent* (spec.md
    /// §4.6 phase 2). Must be non-zero.
    #[must_use]
    pub const fn round_cap(mut self, round_cap: usize) -> Self {
        self.round_cap = round_cap;
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<Coordinator> {
        Arc::new(Coordinator {
            id: EngineId::next(),
            state: ReentrantMutex::new(RefCell::new(CoordinatorState::default())),
            equality: EqualityRegistry::with_tolerance(self.tolerance),
            round_cap: self.round_cap.max(1),
        })
    }
}

/// Single global serializer per manager instance (spec.md §4.4).
pub struct Coordinator {
    id: EngineId,
    state: ReentrantMutex<RefCell<CoordinatorState>>,
    equality: EqualityRegistry,
    round_cap: usize,
}

impl Coordinator {
    /// Construct a coordinator with default knobs (round cap 64, zero
    /// equality tolerance). Use [`Coordinator::builder`] to customize.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    pub(crate) const fn id(&self) -> EngineId {
        self.id
    }

    pub(crate) const fn round_cap(&self) -> usize {
        self.round_cap
    }

    /// The equality registry consulted by phase 1 and phase 2 (spec.md
    /// §4.1). Registration is serialized by the registry's own lock;
    /// callers may register comparators at any time, including mid-commit
    /// from a phase-6 callback (rare, but not forbidden).
    #[must_use]
    pub const fn equality(&self) -> &EqualityRegistry {
        &self.equality
    }

    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<CoordinatorState>> {
        self.state.lock()
    }

    /// The single write entry point (spec.md §4.4). Acquires the
    /// reentrancy guard over every cell in `proposal`, runs the six-phase
    /// protocol under the coordinator lock, and fires post-commit
    /// notifications unless `mode` is [`SubmissionMode::CheckOnly`].
    pub fn submit(&self, proposal: HashMap<CellId, DynValue>, mode: SubmissionMode) -> FusionResult<()> {
        let cells: Vec<CellId> = proposal.keys().copied().collect();
        let _guard = ReentrancyGuard::acquire(self.id, &cells)?;
        let lock = self.lock();
        let outcome = submission::run_phases(self, &lock, proposal, mode)?;
        if !matches!(mode, SubmissionMode::CheckOnly) {
            submission::notify(&lock, &outcome);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Hook/cell arena management, used by the typed `Hook<T>` handle.
    // ---------------------------------------------------------------

    pub(crate) fn insert_floating_hook(
        &self,
        initial: DynValue,
        validator: Option<ValidatorFn>,
        reaction: Option<ReactionFn>,
    ) -> HookId {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        let mut cell = CellRecord::new(initial);
        let mut hook = HookRecord::new(cell.id());
        hook.set_validator(validator);
        hook.set_reaction_callback(reaction);
        let hook_id = hook.id();
        cell.add_hook(hook_id);
        state.cells.insert(cell.id(), cell);
        state.hooks.insert(hook_id, hook);
        state.hook_refcounts.insert(hook_id, 1);
        hook_id
    }

    pub(crate) fn insert_owned_hook(
        &self,
        initial: DynValue,
        validator: Option<ValidatorFn>,
        binding: CompositeBinding,
    ) -> HookId {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        let mut cell = CellRecord::new(initial);
        let mut hook = HookRecord::new(cell.id());
        hook.set_validator(validator);
        hook.set_composite_binding(Some(binding));
        let hook_id = hook.id();
        cell.add_hook(hook_id);
        state.cells.insert(cell.id(), cell);
        state.hooks.insert(hook_id, hook);
        state.hook_refcounts.insert(hook_id, 1);
        hook_id
    }

    pub(crate) fn retain_hook(&self, hook: HookId) {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        *state.hook_refcounts.entry(hook).or_insert(0) += 1;
    }

    /// Drop a strong handle to `hook`. When the count reaches zero the hook
    /// unlinks from its cell; an emptied cell is removed with it (spec.md
    /// §3 "destroyed when no live hooks remain").
    pub(crate) fn release_hook(&self, hook: HookId) {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        let remaining = match state.hook_refcounts.get_mut(&hook) {
            Some(count) if *count > 1 => {
                *count -= 1;
                return;
            }
            Some(_) => 0,
            None => return,
        };
        debug_assert_eq!(remaining, 0);
        state.hook_refcounts.remove(&hook);
        if let Some(record) = state.hooks.remove(&hook) {
            let cell_id = record.cell();
            let cell_empty = state.cells.get_mut(&cell_id).is_some_and(|cell| {
                cell.remove_hook(hook);
                cell.members().is_empty()
            });
            if cell_empty {
                state.cells.remove(&cell_id);
            }
        }
    }

    pub(crate) fn hook_cell(&self, hook: HookId) -> CellId {
        let lock = self.lock();
        let state = lock.borrow();
        state.hooks.get(&hook).expect("hook exists while handle is alive").cell()
    }

    pub(crate) fn hook_identifier(&self, hook: HookId) -> Option<fusion_core::Identifier> {
        let lock = self.lock();
        let state = lock.borrow();
        state
            .hooks
            .get(&hook)
            .and_then(|h| h.composite_binding())
            .map(|binding| binding.identifier.clone())
    }

    pub(crate) fn hook_value(&self, hook: HookId) -> DynValue {
        let lock = self.lock();
        let state = lock.borrow();
        let cell_id = state.hooks.get(&hook).expect("hook exists while handle is alive").cell();
        state
            .cells
            .get(&cell_id)
            .expect("cell exists for live hook")
            .current_value()
            .clone()
    }

    /// `callback` is stored weakly (spec.md §9 / SPEC_FULL.md "Listener
    /// storage is weak"); the caller's [`crate::Subscription`] holds the
    /// matching strong `Arc`, so the coordinator's own arena can never keep
    /// a hook's [`Arc<Coordinator>`](Coordinator) reachable through its own
    /// listener list.
    pub(crate) fn add_listener(&self, hook: HookId, callback: WeakReactionFn) -> fusion_core::ListenerId {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        let record = state.hooks.get_mut(&hook).expect("hook exists while handle is alive");
        if let Some((existing, _)) = record
            .listeners()
            .iter()
            .find(|(_, existing_weak)| existing_weak.ptr_eq(&callback))
        {
            return *existing;
        }
        let id = fusion_core::ListenerId::next();
        record.push_listener(id, callback);
        id
    }

    pub(crate) fn remove_listener(&self, hook: HookId, listener: fusion_core::ListenerId) {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        if let Some(record) = state.hooks.get_mut(&hook) {
            record.remove_listener(listener);
        }
    }

    pub(crate) fn set_reaction(&self, hook: HookId, callback: Option<ReactionFn>) {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        if let Some(record) = state.hooks.get_mut(&hook) {
            record.set_reaction_callback(callback);
        }
    }

    /// Register a multi-hook object under the composite contract (spec.md
    /// §4.7). Re-registering the same [`CompositeId`] replaces the prior
    /// registration.
    pub fn register_composite(&self, contract: Arc<dyn CompositeContract>) {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        state.composites.insert(contract.id(), contract);
    }

    pub fn unregister_composite(&self, id: CompositeId) {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        state.composites.remove(&id);
    }

    /// Register the publish/subscribe collaborator consulted in phase 6
    /// step (iii) (spec.md §6 "Downward API").
    pub fn set_publisher(&self, publisher: Arc<dyn PublisherCollaborator>) {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        state.publisher = Some(publisher);
    }

    pub fn clear_publisher(&self) {
        let lock = self.lock();
        let mut state = lock.borrow_mut();
        state.publisher = None;
    }

    // ---------------------------------------------------------------
    // Diagnostics (spec.md §6 "Diagnostic queries").
    // ---------------------------------------------------------------

    #[must_use]
    pub fn cell_count(&self) -> usize {
        let lock = self.lock();
        lock.borrow().cells.len()
    }

    #[must_use]
    pub fn cell_snapshots(&self) -> Vec<CellSnapshot> {
        let lock = self.lock();
        let state = lock.borrow();
        state.cells.values().map(CellSnapshot::from).collect()
    }

    /// Diagnostic channel of phase-6 callback panics, most recent last
    /// (spec.md §7: "captured and attached to a diagnostic channel").
    #[must_use]
    pub fn notification_failures(&self) -> Vec<String> {
        let lock = self.lock();
        lock.borrow().notification_failures.clone()
    }

    pub fn clear_notification_failures(&self) {
        let lock = self.lock();
        lock.borrow_mut().notification_failures.clear();
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("id", &self.id)
            .field("cell_count", &self.cell_count())
            .field("round_cap", &self.round_cap)
            .finish()
    }
}

pub(crate) fn record_notification_failure(lock: &RefCell<CoordinatorState>, message: String) {
    lock.borrow_mut().notification_failures.push(message);
}
