#![forbid(unsafe_code)]

//! Primitives for the fusion reactive state-synchronization engine.
//!
//! This crate has no runtime loop and no locking policy of its own — it is
//! the `fusion` analogue of `ftui-core`: terminal-independent primitives
//! there, coordinator-independent data types here. [`fusion_runtime`] owns
//! the single serializing lock, the six-phase submission protocol, and the
//! join/isolate operations that mutate these types.
//!
//! # Modules
//!
//! - [`ids`] — monotonic identifiers and composite-local [`ids::Identifier`]s.
//! - [`value`] — type-erased value storage ([`value::DynValue`]).
//! - [`equality`] — type-pair equality dispatch with tolerance.
//! - [`error`] — the stable error taxonomy crossing the core's API boundary.
//! - [`cell`] — the value store for a fusion domain.
//! - [`hook`] — the data a connection point carries.

pub mod cell;
pub mod equality;
pub mod error;
pub mod hook;
pub mod ids;
pub mod value;

pub use cell::{CellRecord, CellSnapshot};
pub use equality::EqualityRegistry;
pub use error::{FailureSource, FusionError, FusionErrorKind, FusionResult};
pub use hook::{CompositeBinding, HookRecord, ReactionFn, ValidatorFn, WeakReactionFn};
pub use ids::{CellId, CompositeId, EngineId, HookId, Identifier, ListenerId, PublisherId};
pub use value::{DynValue, FusionAny};
