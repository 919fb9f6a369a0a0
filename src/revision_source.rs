//! The `RevisionSource` seam: the engine consumes an ordered
//! sequence of [`Revision`]s without caring where they came from. Embedding
//! applications implement this trait against their own storage (a VCS
//! history, a database of prior scans, ...); [`InMemoryRevisionSource`] is
//! the in-process test double used throughout this crate's own test suite.

use crate::core::errors::Result;
use crate::core::model::Revision;

/// Supplies the ordered revision sequence the engine tracks evolution
/// across. Implementors return revisions already sorted by `revision_id`
/// (the engine does not re-sort); an out-of-order sequence is an
/// [`crate::core::errors::EvoError::InputFormat`]-worthy caller bug, not
/// something this trait recovers from silently.
pub trait RevisionSource {
    /// All revisions to track, in processing order. Restricting to a date
    /// range is the implementor's responsibility; the
    /// engine processes whatever sequence it is given.
    fn revisions(&self) -> Result<Vec<Revision>>;
}

/// An in-memory [`RevisionSource`] backed by a plain `Vec`, used by this
/// crate's integration tests and available to embedders for quick
/// prototyping before wiring up a real source.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRevisionSource {
    revisions: Vec<Revision>,
}

impl InMemoryRevisionSource {
    /// Build a source from an already-ordered list of revisions.
    #[must_use]
    pub fn new(mut revisions: Vec<Revision>) -> Self {
        revisions.sort();
        Self { revisions }
    }

    /// Append one more revision, keeping the sequence sorted.
    pub fn push(&mut self, revision: Revision) {
        self.revisions.push(revision);
        self.revisions.sort();
    }
}

impl RevisionSource for InMemoryRevisionSource {
    fn revisions(&self) -> Result<Vec<Revision>> {
        Ok(self.revisions.clone())
    }
}
