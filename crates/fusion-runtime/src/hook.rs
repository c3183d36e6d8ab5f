//! The public `Hook<T>` handle (spec.md §4.3).
//!
//! `fusion-core::hook::HookRecord` holds the data a connection point
//! carries; this module adds the write path, which needs the coordinator's
//! lock, and the typed, cloneable, reference-counted handle user code holds
//! on to — the `fusion` analogue of the teacher's `Observable<T>`
//! (`ftui-runtime::reactive::observable`).
//!
//! Cloning a `Hook<T>` shares the same underlying [`HookId`]; all clones see
//! the same cell and the same listener set. The last clone to drop releases
//! the hook from the coordinator's arena (spec.md §3 "destroyed when no
//! live hooks remain"), the way `Observable<T>`'s `Rc<RefCell<_>>` releases
//! its inner state on last drop — except a `Hook<T>` is explicitly
//! refcounted against the coordinator rather than relying on `Rc`, since
//! the coordinator (not the handle) owns the arena.

use std::marker::PhantomData;
use std::sync::Arc;

use fusion_core::{
    CompositeBinding, DynValue, FusionAny, FusionResult, HookId, Identifier, ListenerId,
    ReactionFn, ValidatorFn,
};

use crate::coordinator::Coordinator;
use crate::fusion_ops;
use crate::submission::SubmissionMode;

/// A connection point referencing exactly one cell (spec.md §4.3).
///
/// `T` is the domain type stored in the cell this hook belongs to. A
/// `Hook<T>` is a thin, `Clone`-able handle: the actual state lives in the
/// owning [`Coordinator`]'s arena.
pub struct Hook<T> {
    coordinator: Arc<Coordinator>,
    id: HookId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FusionAny> Hook<T> {
    /// Create a floating hook (no composite binding) with an initial value
    /// and no validator or reaction callback.
    #[must_use]
    pub fn new(coordinator: &Arc<Coordinator>, initial: T) -> Self {
        Self::builder(coordinator, initial).build()
    }

    /// Start a [`HookBuilder`] for a floating hook with validator and/or
    /// reaction-callback configuration (spec.md §6 "Hook construction").
    #[must_use]
    pub fn builder(coordinator: &Arc<Coordinator>, initial: T) -> HookBuilder<T> {
        HookBuilder {
            coordinator: Arc::clone(coordinator),
            initial,
            validator: None,
            reaction: None,
        }
    }

    /// Construct a hook owned by a composite at `identifier` (spec.md §3
    /// "Composite binding"). Used by composite implementations to wire up
    /// their primary and secondary hooks.
    #[must_use]
    pub fn new_owned(
        coordinator: &Arc<Coordinator>,
        initial: T,
        binding: CompositeBinding,
        validator: Option<ValidatorFn>,
    ) -> Self {
        let id = coordinator.insert_owned_hook(DynValue::new(initial), validator, binding);
        Self {
            coordinator: Arc::clone(coordinator),
            id,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn id(&self) -> HookId {
        self.id
    }

    /// The cell this hook currently references. Composite implementations
    /// use this at construction time to map their identifiers to
    /// [`fusion_core::CellId`]s for [`crate::CompositeContract::primary_cell`]
    /// (spec.md §4.7).
    #[must_use]
    pub fn cell_id(&self) -> fusion_core::CellId {
        self.coordinator.hook_cell(self.id)
    }

    /// The composite identifier this hook is registered under, if owned.
    #[must_use]
    pub fn identifier(&self) -> Option<Identifier> {
        self.coordinator.hook_identifier(self.id)
    }
}

impl<T: FusionAny + Clone> Hook<T> {
    /// The cell's current value (spec.md §4.3 `value()`).
    #[must_use]
    pub fn value(&self) -> T {
        self.coordinator
            .hook_value(self.id)
            .downcast_cloned()
            .expect("hook value matches its declared type")
    }

    /// Build `{self.cell -> new_value}` and submit in normal mode (spec.md
    /// §4.3 `submit`). Fails with *ValidationRejected*, *Reentrant*, or
    /// *TypeMismatch* per the taxonomy in spec.md §7.
    pub fn submit(&self, new_value: T) -> FusionResult<()> {
        let cell = self.coordinator.hook_cell(self.id);
        let mut proposal = std::collections::HashMap::new();
        proposal.insert(cell, DynValue::new(new_value));
        self.coordinator.submit(proposal, SubmissionMode::Normal)
    }

    /// Submit unconditionally even if the new value is equal to the
    /// current one (spec.md §4.4 `ForcedSubmission`).
    pub fn submit_forced(&self, new_value: T) -> FusionResult<()> {
        let cell = self.coordinator.hook_cell(self.id);
        let mut proposal = std::collections::HashMap::new();
        proposal.insert(cell, DynValue::new(new_value));
        self.coordinator.submit(proposal, SubmissionMode::Forced)
    }

    /// Report whether a submission would succeed without committing it
    /// (spec.md §4.4 `CheckOnly`).
    pub fn check(&self, new_value: T) -> FusionResult<()> {
        let cell = self.coordinator.hook_cell(self.id);
        let mut proposal = std::collections::HashMap::new();
        proposal.insert(cell, DynValue::new(new_value));
        self.coordinator.submit(proposal, SubmissionMode::CheckOnly)
    }
}

impl<T> Hook<T> {
    /// Fuse this hook's domain with `other`'s (spec.md §4.5 `join`).
    pub fn join(&self, other: &Hook<T>) -> FusionResult<()> {
        fusion_ops::join(&self.coordinator, self.id, other.id)
    }

    /// Remove this hook into a fresh singleton cell (spec.md §4.5 `isolate`).
    pub fn isolate(&self) -> FusionResult<()> {
        fusion_ops::isolate(&self.coordinator, self.id)
    }

    /// True iff `self` and `other` currently share a cell (spec.md §4.3).
    #[must_use]
    pub fn is_joined_with(&self, other: &Hook<T>) -> bool {
        fusion_ops::is_joined_with(&self.coordinator, self.id, other.id)
    }

    /// Register an argument-less listener, fired in phase 6 step (iv) in
    /// insertion order. Duplicate adds of the exact same callback `Arc` are
    /// idempotent, returning the same [`ListenerId`] (spec.md §4.3) inside
    /// the returned [`Subscription`].
    ///
    /// The hook stores `callback` weakly; the returned [`Subscription`]
    /// holds the strong `Arc` that keeps it alive. Dropping the
    /// `Subscription` is equivalent to `remove_listener`: the callback
    /// becomes unreachable and is pruned the next time this hook's
    /// listeners fire (SPEC_FULL.md, grounded in the teacher's
    /// `Observable::subscribe`/`Subscription`).
    pub fn add_listener(&self, callback: ReactionFn) -> Subscription {
        let weak = Arc::downgrade(&callback);
        let id = self.coordinator.add_listener(self.id, weak);
        Subscription { id, _guard: callback }
    }

    /// Remove a listener by its token. Removing an absent token is a
    /// silent no-op (spec.md §4.3). An explicit alternative to dropping the
    /// [`Subscription`] `add_listener` returns.
    pub fn remove_listener(&self, listener: ListenerId) {
        self.coordinator.remove_listener(self.id, listener);
    }

    /// Replace the hook-local post-commit reaction callback (spec.md §4.3).
    pub fn set_reaction_callback(&self, callback: Option<ReactionFn>) {
        self.coordinator.set_reaction(self.id, callback);
    }
}

impl<T> Clone for Hook<T> {
    fn clone(&self) -> Self {
        self.coordinator.retain_hook(self.id);
        Self {
            coordinator: Arc::clone(&self.coordinator),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Hook<T> {
    fn drop(&mut self) {
        self.coordinator.release_hook(self.id);
    }
}

impl<T> std::fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Builder for a floating [`Hook`], configuring the optional isolated
/// validator and reaction callback spec.md §6 lists as constructor
/// parameters.
pub struct HookBuilder<T> {
    coordinator: Arc<Coordinator>,
    initial: T,
    validator: Option<ValidatorFn>,
    reaction: Option<ReactionFn>,
}

impl<T: FusionAny> HookBuilder<T> {
    /// Attach a pure, deterministic isolated validator (spec.md §4.3
    /// "Validator contract").
    #[must_use]
    pub fn validator(
        mut self,
        validator: impl Fn(&DynValue) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Attach a post-commit reaction callback.
    #[must_use]
    pub fn reaction(mut self, reaction: impl Fn() + Send + Sync + 'static) -> Self {
        self.reaction = Some(Arc::new(reaction));
        self
    }

    #[must_use]
    pub fn build(self) -> Hook<T> {
        let id = self.coordinator.insert_floating_hook(
            DynValue::new(self.initial),
            self.validator,
            self.reaction,
        );
        Hook {
            coordinator: self.coordinator,
            id,
            _marker: PhantomData,
        }
    }
}

/// RAII guard for a listener registered via [`Hook::add_listener`].
///
/// Grounded in the teacher's `Subscription`
/// (`ftui-runtime::reactive::observable::Subscription`): dropping it drops
/// the strong `Arc` it holds, so the matching `Weak` in the hook's listener
/// list fails to upgrade and is pruned the next time that hook's listeners
/// fire (spec.md §4.6 phase 6 step iv). Unlike the teacher's version —
/// which wraps the strong reference in `Box<dyn Any>` because `Observable<T>`
/// is generic over `T` and needs one non-generic guard type for every `T` —
/// [`ReactionFn`] is already non-generic, so the guard can hold it directly.
pub struct Subscription {
    id: ListenerId,
    _guard: ReactionFn,
}

impl Subscription {
    /// The token this subscription was registered under, the same one
    /// [`Hook::remove_listener`] accepts for explicit early removal.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}
