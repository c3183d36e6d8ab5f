//! Type-pair equality dispatch with tolerance (spec.md §4.1).
//!
//! `equals` is consulted exactly once per `{cell, old, new}` pair during
//! phase 1 of the submission protocol; registration while a submission is
//! in flight is serialized by the caller (the coordinator holds its own
//! lock around the whole pipeline, so registry mutation never races a
//! commit in progress).

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::value::DynValue;

type Comparator = Arc<dyn Fn(&DynValue, &DynValue, f64) -> bool + Send + Sync>;

struct RegistryState {
    comparators: HashMap<(TypeId, TypeId), Comparator>,
    tolerance: f64,
}

/// Dispatches `(A, B) -> bool` equality comparisons by type pair, with a
/// scalar tolerance threaded through to every registered comparator.
///
/// Missing pairs fall back to [`DynValue::structural_eq`] (spec.md §4.1,
/// "if none is registered uses structural equality").
pub struct EqualityRegistry {
    state: RwLock<RegistryState>,
}

impl EqualityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tolerance(0.0)
    }

    #[must_use]
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                comparators: HashMap::new(),
                tolerance,
            }),
        }
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.state.read().expect("equality registry poisoned").tolerance
    }

    pub fn set_tolerance(&self, tolerance: f64) {
        self.state.write().expect("equality registry poisoned").tolerance = tolerance;
    }

    /// Register a comparator for the unordered pair `(A, B)`. A prior
    /// registration for the same pair (in either order) is replaced.
    pub fn register<A, B, F>(&self, compare: F)
    where
        A: 'static,
        B: 'static,
        F: Fn(&A, &B, f64) -> bool + Send + Sync + 'static,
    {
        let key = (TypeId::of::<A>(), TypeId::of::<B>());
        let cmp: Comparator = Arc::new(move |a, b, tolerance| {
            if let (Some(av), Some(bv)) = (a.downcast_ref::<A>(), b.downcast_ref::<B>()) {
                return compare(av, bv, tolerance);
            }
            if let (Some(av), Some(bv)) = (a.downcast_ref::<B>(), b.downcast_ref::<A>()) {
                return compare(bv, av, tolerance);
            }
            false
        });
        let mut state = self.state.write().expect("equality registry poisoned");
        state.comparators.insert(key, cmp.clone());
        state.comparators.insert((key.1, key.0), cmp);
        tracing::trace!(type_a = ?key.0, type_b = ?key.1, "equality comparator registered");
    }

    /// Remove any comparator registered for `(A, B)` (in either order).
    pub fn unregister<A: 'static, B: 'static>(&self) {
        let key = (TypeId::of::<A>(), TypeId::of::<B>());
        let mut state = self.state.write().expect("equality registry poisoned");
        state.comparators.remove(&key);
        state.comparators.remove(&(key.1, key.0));
        tracing::trace!(type_a = ?key.0, type_b = ?key.1, "equality comparator unregistered");
    }

    /// Compare two values: a registered comparator for their type pair, or
    /// structural equality if none applies.
    #[must_use]
    pub fn equals(&self, a: &DynValue, b: &DynValue) -> bool {
        let key = (a.type_id(), b.type_id());
        let (comparator, tolerance) = {
            let state = self.state.read().expect("equality registry poisoned");
            (state.comparators.get(&key).cloned(), state.tolerance)
        };
        let result = match comparator {
            Some(cmp) => cmp(a, b, tolerance),
            None => a.structural_eq(b),
        };
        tracing::trace!(equal = result, "equality check");
        result
    }
}

impl Default for EqualityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EqualityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("equality registry poisoned");
        f.debug_struct("EqualityRegistry")
            .field("pairs", &state.comparators.len())
            .field("tolerance", &state.tolerance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_fallback_for_unregistered_pair() {
        let registry = EqualityRegistry::new();
        assert!(registry.equals(&DynValue::new(1i64), &DynValue::new(1i64)));
        assert!(!registry.equals(&DynValue::new(1i64), &DynValue::new(2i64)));
    }

    #[test]
    fn registered_float_tolerance() {
        let registry = EqualityRegistry::with_tolerance(1e-9);
        registry.register::<f64, f64, _>(|a, b, tolerance| (a - b).abs() <= tolerance);
        assert!(registry.equals(&DynValue::new(1.0_f64), &DynValue::new(1.0_f64)));
        assert!(registry.equals(&DynValue::new(1.0_f64), &DynValue::new(1.0 + 1e-12)));
        assert!(!registry.equals(&DynValue::new(1.0_f64), &DynValue::new(1.1_f64)));
    }

    #[test]
    fn registration_is_unordered() {
        let registry = EqualityRegistry::new();
        registry.register::<i64, i32, _>(|a, b, _tol| *a == i64::from(*b));
        assert!(registry.equals(&DynValue::new(5i64), &DynValue::new(5i32)));
        assert!(registry.equals(&DynValue::new(5i32), &DynValue::new(5i64)));
    }

    #[test]
    fn unregister_restores_structural_fallback() {
        let registry = EqualityRegistry::new();
        registry.register::<i64, i32, _>(|_, _, _| true);
        assert!(registry.equals(&DynValue::new(1i64), &DynValue::new(2i32)));
        registry.unregister::<i64, i32>();
        // No comparator, and the two DynValues have different concrete
        // types, so structural equality (which compares same-type only) is
        // always false here.
        assert!(!registry.equals(&DynValue::new(1i64), &DynValue::new(2i32)));
    }
}
