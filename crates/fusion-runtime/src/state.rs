//! The coordinator's private arena: every live cell, hook, composite, and
//! the optional publisher collaborator, all mutated only while the
//! coordinator's lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use fusion_core::{CellId, CellRecord, CompositeId, HookId, HookRecord};

use crate::composite::CompositeContract;
use crate::publisher::PublisherCollaborator;

#[derive(Default)]
pub(crate) struct CoordinatorState {
    pub(crate) cells: HashMap<CellId, CellRecord>,
    pub(crate) hooks: HashMap<HookId, HookRecord>,
    pub(crate) composites: HashMap<CompositeId, Arc<dyn CompositeContract>>,
    pub(crate) publisher: Option<Arc<dyn PublisherCollaborator>>,
    /// Diagnostic channel for phase-6 listener/callback panics (spec.md §7:
    /// "captured and attached to a diagnostic channel but do not roll back
    /// the commit").
    pub(crate) notification_failures: Vec<String>,
    /// Strong-handle count per hook. `Hook<T>` is the owning handle (spec.md
    /// §9 "intrusive lists that the hook's destructor unlinks"); when the
    /// last clone drops, the hook unlinks from its cell, and an emptied
    /// cell is dropped with it.
    pub(crate) hook_refcounts: HashMap<HookId, usize>,
}
