#![forbid(unsafe_code)]

//! Fusion: a reactive state-synchronization engine.
//!
//! This crate provides the stable, ergonomic surface area for users: a
//! curated re-export of [`fusion_core`] and [`fusion_runtime`] behind one
//! [`prelude`] module, the `fusion` analogue of the `ftui` facade crate's
//! `[features] default = ["runtime"]` pattern.
//!
//! # Quick start
//!
//! ```
//! use fusion::prelude::*;
//!
//! let coordinator = Coordinator::new();
//! let a: Hook<i64> = Hook::new(&coordinator, 10);
//! let b: Hook<i64> = Hook::new(&coordinator, 20);
//!
//! a.join(&b).expect("join succeeds");
//! assert_eq!(a.value(), 10);
//! assert_eq!(b.value(), 10);
//! ```

pub use fusion_core::{
    CellId, CellSnapshot, CompositeBinding, CompositeId, DynValue, EngineId, EqualityRegistry,
    FailureSource, FusionAny, FusionError, FusionErrorKind, FusionResult, HookId, Identifier,
    ListenerId, PublisherId, ReactionFn, ValidatorFn,
};

#[cfg(feature = "runtime")]
pub use fusion_runtime::{
    CommitInfo, CompositeContract, Coordinator, CoordinatorBuilder, Hook, HookBuilder,
    PublisherCollaborator, Subscription, SubmissionMode, UpdateView,
};

/// Everything most callers need in scope: the typed [`Hook`] handle, the
/// [`Coordinator`], submission modes, and the core data/error types.
pub mod prelude {
    pub use fusion_core::{
        DynValue, FusionAny, FusionError, FusionErrorKind, FusionResult, Identifier,
    };

    #[cfg(feature = "runtime")]
    pub use fusion_runtime::{
        CompositeContract, Coordinator, Hook, Subscription, SubmissionMode, UpdateView,
    };
}
