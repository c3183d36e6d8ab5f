//! Cell storage: the identity node of a fusion domain (spec.md §3, §4.2).

use web_time::Instant;

use crate::ids::{CellId, HookId};
use crate::value::DynValue;

/// The value store shared by every hook in a fusion domain.
///
/// Membership is tracked by [`HookId`] rather than a strong handle to the
/// hook itself — this is the "intrusive list unlinked by the hook's
/// destructor" strategy spec.md §9 calls out as one of three conforming
/// ways to keep cell-to-hook references weak: a live [`HookId`] only
/// remains in `members` for as long as some hook handle keeps it
/// registered with the coordinator, and hook `Drop` unlinks it.
#[derive(Debug)]
pub struct CellRecord {
    id: CellId,
    current_value: DynValue,
    previous_value: DynValue,
    members: Vec<HookId>,
    creation_time: Instant,
    version: u64,
}

impl CellRecord {
    #[must_use]
    pub fn new(value: DynValue) -> Self {
        Self {
            id: CellId::next(),
            previous_value: value.clone(),
            current_value: value,
            members: Vec::new(),
            creation_time: Instant::now(),
            version: 0,
        }
    }

    /// Construct with an explicit id, used when fusion produces a surviving
    /// cell whose id must remain stable (spec.md §9, "keeps one of the two
    /// cells as the survivor").
    #[must_use]
    pub fn with_id(id: CellId, value: DynValue) -> Self {
        Self {
            id,
            previous_value: value.clone(),
            current_value: value,
            members: Vec::new(),
            creation_time: Instant::now(),
            version: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> CellId {
        self.id
    }

    #[must_use]
    pub fn current_value(&self) -> &DynValue {
        &self.current_value
    }

    #[must_use]
    pub fn previous_value(&self) -> &DynValue {
        &self.previous_value
    }

    #[must_use]
    pub fn members(&self) -> &[HookId] {
        &self.members
    }

    #[must_use]
    pub const fn creation_time(&self) -> Instant {
        self.creation_time
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    pub fn add_hook(&mut self, hook: HookId) {
        if !self.members.contains(&hook) {
            self.members.push(hook);
        }
    }

    pub fn remove_hook(&mut self, hook: HookId) {
        self.members.retain(|h| *h != hook);
    }

    /// Engine-only mutation: no external caller may touch `current_value`
    /// directly (spec.md §4.2 invariant). Records `previous_value` and bumps
    /// `version` exactly once per accepted commit.
    pub fn set_internal(&mut self, new_value: DynValue) {
        self.previous_value = std::mem::replace(&mut self.current_value, new_value);
        self.version += 1;
    }
}

/// A point-in-time, read-only view of a cell for diagnostics (spec.md §6,
/// "per-cell `(id, current_value, previous_value, member_count,
/// creation_time)`").
#[derive(Debug, Clone)]
pub struct CellSnapshot {
    pub id: CellId,
    pub current_value: DynValue,
    pub previous_value: DynValue,
    pub member_count: usize,
    pub creation_time: Instant,
    pub version: u64,
}

impl From<&CellRecord> for CellSnapshot {
    fn from(cell: &CellRecord) -> Self {
        Self {
            id: cell.id,
            current_value: cell.current_value.clone(),
            previous_value: cell.previous_value.clone(),
            member_count: cell.members.len(),
            creation_time: cell.creation_time,
            version: cell.version,
        }
    }
}
