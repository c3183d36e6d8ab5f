//! The publisher collaborator (spec.md §6 "Downward API").
//!
//! This is a downward-facing contract: the core calls into the publish/
//! subscribe module through it during phase 6 step (iii), but never
//! implements it itself. Dispatch may be asynchronous; the core's atomicity
//! guarantee ends at this boundary (spec.md §4.6, §9).

use fusion_core::{CellId, PublisherId};

/// Everything phase 6 step (iii) needs to describe a finished commit to a
/// publisher: the full set of cells touched by this submission.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub cells: Vec<CellId>,
}

/// Opaque collaborator supporting `publications_for` / `publish` (spec.md
/// §6). Registered once per [`crate::Coordinator`] via
/// [`crate::Coordinator::set_publisher`].
pub trait PublisherCollaborator: Send + Sync {
    fn publications_for(&self, cell: CellId) -> Vec<PublisherId>;

    /// Dispatch may be asynchronous and is best-effort; the core does not
    /// observe or retry failures here (spec.md §9 "Publisher dispatch
    /// asynchrony").
    fn publish(&self, publisher: PublisherId, commit: &CommitInfo);
}
