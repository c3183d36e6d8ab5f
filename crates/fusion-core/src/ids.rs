//! Monotonic identifiers for cells, hooks, composites, and coordinators.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! monotonic_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Allocate a fresh, globally unique id.
            pub fn next() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(1);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// The raw integer value, stable for the id's lifetime.
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

monotonic_id!(CellId);
monotonic_id!(HookId);
monotonic_id!(CompositeId);
monotonic_id!(EngineId);
monotonic_id!(ListenerId);
monotonic_id!(PublisherId);

/// A composite-local identifier, per spec.md §3 "Composite binding": either
/// a string name or a tagged integer key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Name(Cow<'static, str>),
    Tag(u64),
}

impl Identifier {
    #[must_use]
    pub fn name(s: impl Into<Cow<'static, str>>) -> Self {
        Self::Name(s.into())
    }

    #[must_use]
    pub const fn tag(t: u64) -> Self {
        Self::Tag(t)
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(n) => write!(f, "{n}"),
            Self::Tag(t) => write!(f, "#{t}"),
        }
    }
}

impl From<&'static str> for Identifier {
    fn from(s: &'static str) -> Self {
        Self::Name(Cow::Borrowed(s))
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self::Name(Cow::Owned(s))
    }
}

impl From<u64> for Identifier {
    fn from(t: u64) -> Self {
        Self::Tag(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let a = CellId::next();
        let b = CellId::next();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn identifier_equality_by_value() {
        assert_eq!(Identifier::name("dict"), Identifier::name("dict"));
        assert_ne!(Identifier::name("dict"), Identifier::tag(0));
        assert_eq!(Identifier::tag(7), Identifier::from(7u64));
    }
}
