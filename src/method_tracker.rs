//! Method lineage bookkeeping across a revision sequence.
//!
//! A lineage follows one logical method as its block_id changes across
//! revisions via matches. [`MethodTracker`] is driven one revision pair at
//! a time by the engine's outer loop: [`MethodTracker::seed`] for the first
//! revision, then [`MethodTracker::advance`] for every subsequent pair,
//! using that pair's [`MethodMatch`] results.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::core::model::{MethodMatch, Revision};

/// Lifetime accounting for one lineage as observed at a particular revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineageSnapshot {
    /// Number of revisions this lineage has been observed in, inclusive of
    /// the revision this snapshot was taken at
    pub lifetime_revisions: u32,
    /// Days between the lineage's first and current observation
    pub lifetime_days: i64,
}

#[derive(Debug, Clone)]
struct LineageState {
    first_date: NaiveDate,
    revisions_seen: u32,
}

impl LineageState {
    fn snapshot(&self, current_date: NaiveDate) -> LineageSnapshot {
        LineageSnapshot {
            lifetime_revisions: self.revisions_seen,
            lifetime_days: (current_date - self.first_date).num_days(),
        }
    }
}

/// Tracks method lineages across an ordered sequence of revisions.
#[derive(Debug, Default)]
pub struct MethodTracker {
    /// block_id in the most recently processed revision -> lineage state
    current: BTreeMap<String, LineageState>,
}

impl MethodTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker with the first revision: every block starts a new,
    /// one-revision-old lineage.
    pub fn seed(&mut self, revision: &Revision) -> BTreeMap<String, LineageSnapshot> {
        self.current.clear();
        let mut snapshots = BTreeMap::new();
        for block_id in revision.blocks.keys() {
            let state = LineageState {
                first_date: revision.date,
                revisions_seen: 1,
            };
            snapshots.insert(block_id.clone(), state.snapshot(revision.date));
            self.current.insert(block_id.clone(), state);
        }
        snapshots
    }

    /// Lineage snapshot for a block as of the last revision processed
    /// (seed or advance). Used to report lineage metrics for blocks that do
    /// not survive into the next revision.
    #[must_use]
    pub fn snapshot(&self, block_id: &str, as_of: NaiveDate) -> Option<LineageSnapshot> {
        self.current.get(block_id).map(|state| state.snapshot(as_of))
    }

    /// Advance lineages across one matched revision pair, returning a
    /// snapshot for every block_id in `to`.
    pub fn advance(
        &mut self,
        to: &Revision,
        matches: &BTreeMap<String, MethodMatch>,
    ) -> BTreeMap<String, LineageSnapshot> {
        let mut next: BTreeMap<String, LineageState> = BTreeMap::new();

        for (source_id, m) in matches {
            let Some(target_id) = m.target() else {
                continue; // lineage ends here
            };
            let Some(state) = self.current.get(source_id) else {
                continue;
            };
            next.insert(
                target_id.to_string(),
                LineageState {
                    first_date: state.first_date,
                    revisions_seen: state.revisions_seen + 1,
                },
            );
        }

        // Any block in `to` not reached by a survived lineage is new.
        for block_id in to.blocks.keys() {
            next.entry(block_id.clone()).or_insert(LineageState {
                first_date: to.date,
                revisions_seen: 1,
            });
        }

        self.current = next;
        self.current
            .iter()
            .map(|(id, state)| (id.clone(), state.snapshot(to.date)))
            .collect()
    }
}
