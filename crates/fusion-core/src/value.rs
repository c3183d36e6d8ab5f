//! Type-erased value storage for fusion cells.
//!
//! A [`Cell`](crate::cell::CellRecord) holds its `current_value` by reference
//! (spec.md §3 "Ownership"), never copied, regardless of the domain type `T`
//! the wrapper layer presents upward. Internally the engine stores an
//! [`Arc<dyn FusionAny>`] and downcasts back to `T` at the hook boundary.
//!
//! Grounded in `ftui-runtime::undo::command`'s `as_any`/`downcast_ref::<Self>`
//! type-erased `Command` trait objects.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A value a fusion cell can store: `Any` for downcasting, `Debug` for
/// diagnostics, `Send + Sync` so cells may be shared across threads.
///
/// Structural equality falls back to `PartialEq` via the blanket impl below;
/// types lacking `PartialEq` can only be compared through a registered
/// [`crate::equality::EqualityRegistry`] entry.
pub trait FusionAny: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn Any) -> bool;
}

impl<T> FusionAny for T
where
    T: Any + fmt::Debug + Send + Sync + PartialEq,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|o| self == o)
    }
}

/// A type-erased, reference-counted handle to a cell's stored value.
///
/// Cloning a `DynValue` clones the handle, not the underlying value — this
/// is what lets `set_internal` hand the same value to multiple hooks without
/// copying it.
#[derive(Clone)]
pub struct DynValue(Arc<dyn FusionAny>);

impl DynValue {
    pub fn new<T: FusionAny>(value: T) -> Self {
        Self(Arc::new(value))
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.0.as_any().type_id()
    }

    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Attempt to recover the concrete value, cloning out of the `Arc`.
    ///
    /// Returns `None` if `T` does not match the stored type.
    #[must_use]
    pub fn downcast_cloned<T: Clone + 'static>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    /// Structural equality fallback (used by [`crate::equality::EqualityRegistry`]
    /// when no type-pair comparator is registered).
    #[must_use]
    pub fn structural_eq(&self, other: &DynValue) -> bool {
        self.0.dyn_eq(other.0.as_any())
    }
}

impl fmt::Debug for DynValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_round_trip() {
        let v = DynValue::new(42i64);
        assert_eq!(v.downcast_ref::<i64>(), Some(&42));
        assert_eq!(v.downcast_ref::<String>(), None);
    }

    #[test]
    fn structural_eq_respects_type_and_value() {
        let a = DynValue::new(1i64);
        let b = DynValue::new(1i64);
        let c = DynValue::new(2i64);
        let d = DynValue::new("1".to_string());
        assert!(a.structural_eq(&b));
        assert!(!a.structural_eq(&c));
        assert!(!a.structural_eq(&d));
    }

    #[test]
    fn clone_shares_storage() {
        let a = DynValue::new(vec![1, 2, 3]);
        let b = a.clone();
        assert!(a.structural_eq(&b));
    }
}
