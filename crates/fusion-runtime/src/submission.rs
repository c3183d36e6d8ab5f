//! The six-phase submission protocol (spec.md §4.6) — the heart of the
//! engine. `run_phases` executes phases 1–5 (filter, fixed-point
//! completion, affected-component collection, validation, commit);
//! `notify` executes phase 6 separately so [`crate::fusion_ops::join`] can
//! defer notification until after the structural fusion it performs
//! between commit and notify (spec.md §4.5 step 5).
//!
//! Every phase transition is logged via `tracing::debug!` under a
//! `fusion.submit` span, the way the teacher names its propagation span
//! `bloodstream.delta` (`ftui-runtime::reactive::observable::notify`).

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;

use fusion_core::{
    CellId, CompositeId, DynValue, FailureSource, FusionError, FusionErrorKind, FusionResult,
    HookId, HookRecord, Identifier, PublisherId,
};

use crate::composite::UpdateView;
use crate::coordinator::record_notification_failure;
use crate::publisher::CommitInfo;
use crate::state::CoordinatorState;

/// Submission mode, per spec.md §4.4/§4.6 table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Phase 1 filters unchanged values; an empty result short-circuits.
    Normal,
    /// Phase 1 is skipped; every listed cell commits even if equal.
    Forced,
    /// Phases 1–4 run; phase 5 and the mutating half of phase 6 are
    /// skipped. Success means validation would have passed.
    CheckOnly,
}

/// What a completed (or no-op) submission touched, handed from `run_phases`
/// to `notify`.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommitOutcome {
    pub(crate) changed: bool,
    pub(crate) cells: Vec<CellId>,
    pub(crate) touched_composites: Vec<CompositeId>,
    pub(crate) touched_hooks: Vec<HookId>,
    pub(crate) touched_publishers: Vec<PublisherId>,
}

impl CommitOutcome {
    fn empty() -> Self {
        Self::default()
    }
}

/// Phases 1–5. Mutates cells (phase 5) unless `mode` is `CheckOnly`.
/// Returns the touched-component sets phase 6 needs, without running any
/// user callback.
pub(crate) fn run_phases(
    coordinator: &crate::coordinator::Coordinator,
    lock: &RefCell<CoordinatorState>,
    mut proposal: HashMap<CellId, DynValue>,
    mode: SubmissionMode,
) -> FusionResult<CommitOutcome> {
    let _span = tracing::debug_span!("fusion.submit", mode = ?mode, proposed = proposal.len()).entered();

    // Phase 1 — equality filter. CheckOnly filters identically to Normal so
    // that a successful CheckOnly predicts exactly what Normal would do
    // (spec.md §8 property 9); only Forced keeps equal entries.
    if !matches!(mode, SubmissionMode::Forced) {
        let state = lock.borrow();
        proposal.retain(|cell_id, new_value| match state.cells.get(cell_id) {
            Some(cell) => !coordinator.equality().equals(cell.current_value(), new_value),
            None => true,
        });
    }
    if proposal.is_empty() {
        tracing::debug!("submission empty after equality filter, no-op");
        return Ok(CommitOutcome::empty());
    }

    let mut working = proposal;

    // Phase 2 — iterative value completion (fixed point).
    complete_fixed_point(coordinator, lock, &mut working)?;

    // Phase 3 — affected-component collection.
    let cells: Vec<CellId> = working.keys().copied().collect();
    let outcome_shape = outcome_for_cells(lock, cells.clone());

    // Phase 4 — validation.
    validate(lock, &working, &outcome_shape.touched_composites, &outcome_shape.touched_hooks)?;

    // Phase 5 — atomic commit (pure mutation, no user code).
    if !matches!(mode, SubmissionMode::CheckOnly) {
        let mut state = lock.borrow_mut();
        for (cell_id, value) in &working {
            if let Some(cell) = state.cells.get_mut(cell_id) {
                cell.set_internal(value.clone());
            }
        }
    }

    tracing::debug!(committed = !matches!(mode, SubmissionMode::CheckOnly), "submission phases 1-5 complete");

    Ok(CommitOutcome {
        changed: true,
        cells,
        touched_composites: outcome_shape.touched_composites,
        touched_hooks: outcome_shape.touched_hooks,
        touched_publishers: outcome_shape.touched_publishers,
    })
}

fn complete_fixed_point(
    coordinator: &crate::coordinator::Coordinator,
    lock: &RefCell<CoordinatorState>,
    working: &mut HashMap<CellId, DynValue>,
) -> FusionResult<()> {
    let round_cap = coordinator.round_cap();
    let mut round = 0usize;
    loop {
        round += 1;
        if round > round_cap {
            return Err(FusionError::new(
                FusionErrorKind::CompletionDivergent,
                format!("phase 2 did not converge within {round_cap} rounds"),
            ));
        }

        let proposals = {
            let state = lock.borrow();
            let mut composite_ids: Vec<CompositeId> = state.composites.keys().copied().collect();
            composite_ids.sort();

            let mut batch = Vec::new();
            for cid in composite_ids {
                let contract = state.composites.get(&cid).expect("composite present").clone();
                let primaries = contract.primary_identifiers();
                let mut submitted = HashMap::new();
                let mut current = HashMap::new();
                let mut owns_touched = false;
                for ident in &primaries {
                    let Some(cell_id) = contract.primary_cell(ident) else {
                        continue;
                    };
                    if let Some(value) = working.get(&cell_id) {
                        submitted.insert(ident.clone(), value.clone());
                        owns_touched = true;
                    } else if let Some(cell) = state.cells.get(&cell_id) {
                        current.insert(ident.clone(), cell.current_value().clone());
                    }
                }
                if !owns_touched {
                    continue;
                }
                let view = UpdateView { submitted, current };
                batch.push((cid, contract.complete(&view)));
            }
            batch
        };

        let mut added_any = false;
        for (cid, updates) in proposals {
            let contract = {
                let state = lock.borrow();
                state.composites.get(&cid).cloned()
            };
            let Some(contract) = contract else { continue };
            for (ident, value) in updates {
                let Some(cell_id) = contract.primary_cell(&ident) else {
                    return Err(FusionError::from_participant(
                        FusionErrorKind::CompletionExtendsUnknownCell,
                        FailureSource::Composite(cid),
                        format!("complete() returned identifier {ident} outside this composite's binding"),
                    ));
                };
                match working.get(&cell_id) {
                    Some(existing) if coordinator.equality().equals(existing, &value) => {}
                    Some(_) => {
                        return Err(FusionError::from_participant(
                            FusionErrorKind::CompletionConflict,
                            FailureSource::Composite(cid),
                            format!("conflicting value proposed for identifier {ident}"),
                        ));
                    }
                    None => {
                        working.insert(cell_id, value);
                        added_any = true;
                    }
                }
            }
        }

        if !added_any {
            return Ok(());
        }
    }
}

fn validate(
    lock: &RefCell<CoordinatorState>,
    working: &HashMap<CellId, DynValue>,
    touched_composites: &[CompositeId],
    touched_hooks: &[HookId],
) -> FusionResult<()> {
    let state = lock.borrow();

    for cid in touched_composites {
        let Some(contract) = state.composites.get(cid) else {
            continue;
        };
        let mut primaries = HashMap::new();
        for ident in contract.primary_identifiers() {
            let Some(cell_id) = contract.primary_cell(&ident) else {
                continue;
            };
            let value = working
                .get(&cell_id)
                .cloned()
                .or_else(|| state.cells.get(&cell_id).map(|c| c.current_value().clone()));
            if let Some(value) = value {
                primaries.insert(ident, value);
            }
        }
        if let Err(reason) = contract.validate_primary(&primaries) {
            return Err(FusionError::from_participant(
                FusionErrorKind::ValidationRejected,
                FailureSource::Composite(*cid),
                reason,
            ));
        }

        let mut all = primaries.clone();
        for ident in contract.secondary_identifiers() {
            if let Some(value) = contract.compute_secondary(&ident, &primaries) {
                all.insert(ident, value);
            }
        }
        if let Err(reason) = contract.validate_all(&all) {
            return Err(FusionError::from_participant(
                FusionErrorKind::ValidationRejected,
                FailureSource::Composite(*cid),
                reason,
            ));
        }
    }

    for hook_id in touched_hooks {
        let Some(hook) = state.hooks.get(hook_id) else {
            continue;
        };
        let Some(validator) = hook.validator() else {
            continue;
        };
        if let Some(value) = working.get(&hook.cell()) {
            if let Err(reason) = validator(value) {
                return Err(FusionError::from_participant(
                    FusionErrorKind::ValidationRejected,
                    FailureSource::Hook(*hook_id),
                    reason,
                ));
            }
        }
    }

    Ok(())
}

/// Phase 3's collection logic, reusable by `fusion_ops::join` which needs
/// to recompute the touched set over a freshly-fused cell rather than the
/// original proposal's cells.
pub(crate) fn outcome_for_cells(lock: &RefCell<CoordinatorState>, cells: Vec<CellId>) -> CommitOutcome {
    let state = lock.borrow();
    let mut touched_hooks = BTreeSet::new();
    let mut touched_composites = BTreeSet::new();
    let mut touched_publishers = BTreeSet::new();

    for cell_id in &cells {
        if let Some(cell) = state.cells.get(cell_id) {
            for hook_id in cell.members() {
                touched_hooks.insert(*hook_id);
                if let Some(hook) = state.hooks.get(hook_id) {
                    if let Some(binding) = hook.composite_binding() {
                        touched_composites.insert(binding.composite);
                    }
                }
            }
        }
        if let Some(publisher) = &state.publisher {
            for pid in publisher.publications_for(*cell_id) {
                touched_publishers.insert(pid);
            }
        }
    }

    CommitOutcome {
        changed: true,
        cells,
        touched_composites: touched_composites.into_iter().collect(),
        touched_hooks: touched_hooks.into_iter().collect(),
        touched_publishers: touched_publishers.into_iter().collect(),
    }
}

/// Phase 6: post-commit notification, in the fixed order spec.md §4.6
/// mandates. A no-op if `outcome.changed` is false (equality-silent join,
/// spec.md §4.5 step 5 / §8 property 6).
///
/// Unlike the teacher's `BatchScope::drop` flush loop (which re-raises the
/// first panic after running the rest), spec.md §7 says phase-6 exceptions
/// are "captured and attached to a diagnostic channel but do not roll back
/// the commit" — the commit already succeeded, so nothing is re-raised
/// here.
pub(crate) fn notify(lock: &RefCell<CoordinatorState>, outcome: &CommitOutcome) {
    if !outcome.changed {
        return;
    }

    // (i) composite after_commit, composite-id order.
    for cid in &outcome.touched_composites {
        let contract = {
            let state = lock.borrow();
            state.composites.get(cid).cloned()
        };
        if let Some(contract) = contract {
            run_guarded(lock, AssertUnwindSafe(|| contract.after_commit()));
        }
    }

    // (ii) per-hook reaction callback.
    for hook_id in &outcome.touched_hooks {
        let reaction = {
            let state = lock.borrow();
            state.hooks.get(hook_id).and_then(|h| h.reaction_callback().cloned())
        };
        if let Some(cb) = reaction {
            run_guarded(lock, AssertUnwindSafe(|| cb()));
        }
    }

    // (iii) publisher dispatch, best-effort and outside the atomicity
    // guarantee (spec.md §9 "Publisher dispatch asynchrony").
    let publisher = {
        let state = lock.borrow();
        state.publisher.clone()
    };
    if let Some(publisher) = publisher {
        let commit_info = CommitInfo { cells: outcome.cells.clone() };
        for pid in &outcome.touched_publishers {
            run_guarded(lock, AssertUnwindSafe(|| publisher.publish(*pid, &commit_info)));
        }
    }

    // (iv) listeners, insertion order within each hook. Listener storage is
    // weak (spec.md §9 / SPEC_FULL.md "Listener storage is weak"); pruning
    // dead entries here is the lazy-prune-on-notify the teacher's
    // `Observable::notify` performs.
    for hook_id in &outcome.touched_hooks {
        let listeners = {
            let mut state = lock.borrow_mut();
            state.hooks.get_mut(hook_id).map(HookRecord::prune_and_collect_listeners)
        };
        if let Some(listeners) = listeners {
            for (_, cb) in listeners {
                run_guarded(lock, AssertUnwindSafe(|| cb()));
            }
        }
    }
}

fn run_guarded(lock: &RefCell<CoordinatorState>, f: impl FnOnce() + std::panic::UnwindSafe) {
    if let Err(payload) = std::panic::catch_unwind(f) {
        let message = panic_message(&payload);
        tracing::warn!(error = %message, "fusion phase-6 callback panicked");
        record_notification_failure(lock, message);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
