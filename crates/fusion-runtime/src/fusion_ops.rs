//! Join / isolate / is-joined-with on hooks (spec.md §4.5).
//!
//! Both operations acquire the coordinator's single reentrant lock for
//! their entire duration — deadlock-free because there is exactly one lock
//! and nested joins on the same thread simply re-enter it (spec.md §4.5
//! "Deadlock avoidance").
//!
//! `join` rebuilds a fresh surviving cell rather than keeping one of the
//! two inputs alive (spec.md §9 names both as compliant); see DESIGN.md for
//! the tradeoff.

use std::collections::HashMap;

use fusion_core::{CellId, CellRecord, FusionError, FusionErrorKind, FusionResult, HookId};

use crate::coordinator::Coordinator;
use crate::submission::{self, SubmissionMode};

/// Fuse the domains of `a` and `b`. A no-op if they already share a cell.
/// Adopts `a`'s cell's current value onto `b`'s cell via a normal
/// submission so every validator bound to `b`'s members gets a chance to
/// reject it; on rejection the join fails and both cells are untouched
/// (spec.md §4.5 steps 1–3, §8 scenario S4).
pub(crate) fn join(coordinator: &Coordinator, a: HookId, b: HookId) -> FusionResult<()> {
    let lock = coordinator.lock();

    let (cell_a, cell_b) = {
        let state = lock.borrow();
        (
            state.hooks.get(&a).expect("hook exists while handle is alive").cell(),
            state.hooks.get(&b).expect("hook exists while handle is alive").cell(),
        )
    };
    if cell_a == cell_b {
        return Ok(());
    }

    let adopt_value = {
        let state = lock.borrow();
        state
            .cells
            .get(&cell_a)
            .expect("cell exists for live hook")
            .current_value()
            .clone()
    };

    let mut proposal = HashMap::new();
    proposal.insert(cell_b, adopt_value);
    let adoption = submission::run_phases(coordinator, &lock, proposal, SubmissionMode::Normal).map_err(
        |cause| FusionError::wrapping(FusionErrorKind::FusionRejected, "join's value-adoption submission was rejected", cause),
    )?;

    let new_cell_id = {
        let mut state = lock.borrow_mut();
        let value = state
            .cells
            .get(&cell_b)
            .expect("adopted cell exists")
            .current_value()
            .clone();

        let mut members: Vec<HookId> = Vec::new();
        if let Some(old_a) = state.cells.remove(&cell_a) {
            members.extend(old_a.members().iter().copied());
        }
        if let Some(old_b) = state.cells.remove(&cell_b) {
            members.extend(old_b.members().iter().copied());
        }

        let mut new_cell = CellRecord::new(value);
        let new_id = new_cell.id();
        for hook_id in &members {
            new_cell.add_hook(*hook_id);
            if let Some(hook) = state.hooks.get_mut(hook_id) {
                hook.set_cell(new_id);
            }
        }
        state.cells.insert(new_id, new_cell);
        new_id
    };

    // Notify over the fused hook set only if the adoption actually changed
    // the value (spec.md §4.5 step 5, §8 property 6 "equality-silent
    // fusion"). The pre-fusion adoption submission never ran its own
    // phase 6 (we stopped at `run_phases`), so this is the only
    // notification pass for the join.
    if adoption.changed {
        let outcome = submission::outcome_for_cells(&lock, vec![new_cell_id]);
        submission::notify(&lock, &outcome);
    }

    Ok(())
}

/// Remove `hook` into a fresh singleton cell carrying the same value. A
/// no-op if already isolated. Never fires listeners — the value did not
/// change (spec.md §4.5 "isolate").
pub(crate) fn isolate(coordinator: &Coordinator, hook: HookId) -> FusionResult<()> {
    let lock = coordinator.lock();
    let mut state = lock.borrow_mut();

    let old_cell_id: CellId = state.hooks.get(&hook).expect("hook exists while handle is alive").cell();
    let already_isolated = state
        .cells
        .get(&old_cell_id)
        .is_some_and(|cell| cell.members().len() == 1 && cell.members()[0] == hook);
    if already_isolated {
        return Ok(());
    }

    let value = state
        .cells
        .get(&old_cell_id)
        .expect("cell exists for live hook")
        .current_value()
        .clone();
    if let Some(old_cell) = state.cells.get_mut(&old_cell_id) {
        old_cell.remove_hook(hook);
    }

    let mut new_cell = CellRecord::new(value);
    let new_id = new_cell.id();
    new_cell.add_hook(hook);
    state.cells.insert(new_id, new_cell);
    state.hooks.get_mut(&hook).expect("hook exists while handle is alive").set_cell(new_id);

    Ok(())
}

/// True iff `a` and `b` currently share a cell (spec.md §4.3).
pub(crate) fn is_joined_with(coordinator: &Coordinator, a: HookId, b: HookId) -> bool {
    let lock = coordinator.lock();
    let state = lock.borrow();
    match (state.hooks.get(&a), state.hooks.get(&b)) {
        (Some(ha), Some(hb)) => ha.cell() == hb.cell(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::hook::Hook;

    #[test]
    fn join_is_noop_when_already_shared() {
        let coordinator = Coordinator::new();
        let a = Hook::new(&coordinator, 1i64);
        let b = a.clone();
        assert!(join(&coordinator, a.id(), b.id()).is_ok());
        assert!(is_joined_with(&coordinator, a.id(), b.id()));
    }

    #[test]
    fn isolate_detaches_into_singleton() {
        let coordinator = Coordinator::new();
        let a: Hook<i64> = Hook::new(&coordinator, 1);
        let b: Hook<i64> = Hook::new(&coordinator, 2);
        a.join(&b).expect("join succeeds");
        assert_eq!(a.value(), 1);
        assert_eq!(b.value(), 1);

        a.isolate().expect("isolate succeeds");
        assert!(!a.is_joined_with(&b));
        assert_eq!(a.value(), 1);
        assert_eq!(b.value(), 1);
        let _ = Arc::strong_count(&coordinator);
    }
}
