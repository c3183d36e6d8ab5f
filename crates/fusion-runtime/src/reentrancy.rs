//! Thread-local reentrancy guard (spec.md §4.4, §5).
//!
//! Generalizes the teacher's `thread_local!` batch-context idiom
//! (`ftui-runtime::reactive::batch::BATCH_CTX`, "deferred notification
//! closures") from "per-thread deferred closures" to "per-coordinator active
//! `CellId` sets" — keyed by [`EngineId`] so independent `Coordinator`
//! instances on the same thread never see each other's in-flight cell sets.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use fusion_core::{CellId, EngineId, FusionError, FusionErrorKind};

thread_local! {
    static ACTIVE_CELLS: RefCell<HashMap<EngineId, HashSet<CellId>>> = RefCell::new(HashMap::new());
}

/// RAII guard: on construction, fails fast if any of `cells` intersects the
/// thread-local active set for `engine`; otherwise the cells are unioned in
/// and removed again on drop — "a guaranteed-unwind region" (spec.md §4.4),
/// so a panicking phase still releases the reentrancy claim.
pub(crate) struct ReentrancyGuard {
    engine: EngineId,
    cells: Vec<CellId>,
}

impl ReentrancyGuard {
    pub(crate) fn acquire(engine: EngineId, cells: &[CellId]) -> Result<Self, FusionError> {
        ACTIVE_CELLS.with(|active| {
            let mut map = active.borrow_mut();
            let set = map.entry(engine).or_default();
            for cell in cells {
                if set.contains(cell) {
                    return Err(FusionError::new(
                        FusionErrorKind::Reentrant,
                        format!("cell {cell} is already being committed on this thread"),
                    ));
                }
            }
            for cell in cells {
                set.insert(*cell);
            }
            Ok(Self {
                engine,
                cells: cells.to_vec(),
            })
        })
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        ACTIVE_CELLS.with(|active| {
            let mut map = active.borrow_mut();
            if let Some(set) = map.get_mut(&self.engine) {
                for cell in &self.cells {
                    set.remove(cell);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_cell_sets_do_not_conflict() {
        let engine = EngineId::next();
        let a = CellId::next();
        let b = CellId::next();
        let outer = ReentrancyGuard::acquire(engine, &[a]).expect("first claim succeeds");
        let inner = ReentrancyGuard::acquire(engine, &[b]).expect("disjoint claim succeeds");
        drop(inner);
        drop(outer);
    }

    #[test]
    fn overlapping_cell_sets_are_rejected() {
        let engine = EngineId::next();
        let a = CellId::next();
        let _outer = ReentrancyGuard::acquire(engine, &[a]).expect("first claim succeeds");
        let err = ReentrancyGuard::acquire(engine, &[a]).unwrap_err();
        assert_eq!(err.kind(), FusionErrorKind::Reentrant);
    }

    #[test]
    fn drop_releases_claim_for_reuse() {
        let engine = EngineId::next();
        let a = CellId::next();
        {
            let _guard = ReentrancyGuard::acquire(engine, &[a]).unwrap();
        }
        let _guard = ReentrancyGuard::acquire(engine, &[a]).expect("claim released on drop");
    }

    #[test]
    fn distinct_engines_do_not_interfere() {
        let e1 = EngineId::next();
        let e2 = EngineId::next();
        let a = CellId::next();
        let _g1 = ReentrancyGuard::acquire(e1, &[a]).unwrap();
        let _g2 = ReentrancyGuard::acquire(e2, &[a]).expect("separate coordinators are independent");
    }
}
