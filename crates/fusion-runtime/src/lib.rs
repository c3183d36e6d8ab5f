#![forbid(unsafe_code)]

//! The fusion reactive state-synchronization engine's runtime.
//!
//! This crate owns the single serializing lock, the six-phase submission
//! protocol, and the join/isolate fusion operations — the `fusion`
//! analogue of `ftui-runtime` (which owns the batch/subscription/IVM
//! propagation pipeline on top of `ftui-core`'s terminal-independent
//! primitives).
//!
//! # Key Components
//!
//! - [`Coordinator`] — the global serializer; entry point for submissions,
//!   joins, and isolates (spec.md §4.4).
//! - [`Hook`] — the typed, cloneable connection-point handle (spec.md §4.3).
//! - [`CompositeContract`] — the interface a multi-hook object implements
//!   to maintain cross-hook invariants (spec.md §4.7).
//! - [`SubmissionMode`] — `Normal` / `Forced` / `CheckOnly` (spec.md §4.4).
//! - [`PublisherCollaborator`] — the downward publish/subscribe contract
//!   consulted in phase 6 step (iii) (spec.md §6).
//!
//! # Role in the system
//!
//! A user calls a write method on a [`Hook`] or a composite → the call
//! builds a `{Cell -> proposed value}` map and invokes
//! [`Coordinator::submit`] → the coordinator acquires its reentrant lock,
//! pushes the target cells onto the thread-local reentrancy stack, and runs
//! the six-phase protocol (spec.md §2 "Data flow for a value change").

mod composite;
mod coordinator;
mod fusion_ops;
mod hook;
mod publisher;
mod reentrancy;
mod state;
mod submission;

pub use composite::{CompositeContract, UpdateView};
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use hook::{Hook, HookBuilder, Subscription};
pub use publisher::{CommitInfo, PublisherCollaborator};
pub use submission::SubmissionMode;
