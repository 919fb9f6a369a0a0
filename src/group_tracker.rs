//! Clone-group lineage bookkeeping across a revision sequence.
//!
//! Mirrors [`crate::method_tracker::MethodTracker`], keyed by group_id via
//! [`GroupMatch`] instead of block_id via [`crate::core::model::MethodMatch`].
//! Merged groups are a wrinkle plain lineage-following doesn't have: when
//! two or more source groups both accept the same target, only the
//! strongest claim (highest overlap_count, ties broken by source group_id)
//! continues that lineage — the others end, even though their
//! `target_group_id` is still reported on the trace row.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::core::model::{CloneGroup, GroupMatch};
use crate::method_tracker::LineageSnapshot;

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

/// Tracks clone-group lineages across an ordered sequence of revisions.
#[derive(Debug, Default)]
pub struct GroupTracker {
    current: BTreeMap<String, LineageState>,
}

impl GroupTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker with the first revision's groups.
    pub fn seed(
        &mut self,
        groups: &BTreeMap<String, CloneGroup>,
        date: NaiveDate,
    ) -> BTreeMap<String, LineageSnapshot> {
        self.current.clear();
        let mut snapshots = BTreeMap::new();
        for group_id in groups.keys() {
            let state = LineageState {
                first_date: date,
                revisions_seen: 1,
            };
            snapshots.insert(group_id.clone(), state.snapshot(date));
            self.current.insert(group_id.clone(), state);
        }
        snapshots
    }

    /// Lineage snapshot for a group as of the last revision processed.
    #[must_use]
    pub fn snapshot(&self, group_id: &str, as_of: NaiveDate) -> Option<LineageSnapshot> {
        self.current.get(group_id).map(|state| state.snapshot(as_of))
    }

    /// Advance lineages across one matched revision pair. `to_groups` is
    /// only used to know which group_ids exist in the new revision (for
    /// Born groups); matching itself comes from `group_matches`.
    pub fn advance(
        &mut self,
        to_groups: &BTreeMap<String, CloneGroup>,
        group_matches: &BTreeMap<String, GroupMatch>,
        date: NaiveDate,
    ) -> BTreeMap<String, LineageSnapshot> {
        // Resolve merge conflicts: keep only the strongest source claim per
        // target group_id.
        let mut best_claimant: BTreeMap<&str, (&str, usize)> = BTreeMap::new();
        for (source_id, group_match) in group_matches {
            let Some(target_id) = &group_match.target_group_id else {
                continue;
            };
            let entry = best_claimant.entry(target_id.as_str());
            entry
                .and_modify(|(best_source, best_count)| {
                    if group_match.overlap_count > *best_count
                        || (group_match.overlap_count == *best_count && source_id.as_str() < *best_source)
                    {
                        *best_source = source_id.as_str();
                        *best_count = group_match.overlap_count;
                    }
                })
                .or_insert((source_id.as_str(), group_match.overlap_count));
        }

        let mut next: BTreeMap<String, LineageState> = BTreeMap::new();
        for (target_id, (source_id, _)) in &best_claimant {
            if let Some(state) = self.current.get(*source_id) {
                next.insert(
                    (*target_id).to_string(),
                    LineageState {
                        first_date: state.first_date,
                        revisions_seen: state.revisions_seen + 1,
                    },
                );
            }
        }

        for group_id in to_groups.keys() {
            next.entry(group_id.clone()).or_insert(LineageState {
                first_date: date,
                revisions_seen: 1,
            });
        }

        self.current = next;
        self.current
            .iter()
            .map(|(id, state)| (id.clone(), state.snapshot(date)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn group(id: &str) -> CloneGroup {
        CloneGroup {
            group_id: id.to_string(),
            members: BTreeSet::new(),
            pair_similarities: BTreeMap::new(),
        }
    }

    fn group_match(target: Option<&str>, overlap_count: usize, merge: bool) -> GroupMatch {
        GroupMatch {
            target_group_id: target.map(str::to_string),
            overlap_count,
            overlap_ratio: 1.0,
            source_size: 1,
            target_size: 1,
            split: false,
            merge,
        }
    }

    #[test]
    fn seed_gives_every_group_a_fresh_lineage() {
        let mut tracker = GroupTracker::new();
        let groups = BTreeMap::from([("a".to_string(), group("a"))]);
        let snapshots = tracker.seed(&groups, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(snapshots["a"].lifetime_revisions, 1);
    }

    #[test]
    fn matched_group_lineage_continues() {
        let mut tracker = GroupTracker::new();
        let from_groups = BTreeMap::from([("a".to_string(), group("a"))]);
        tracker.seed(&from_groups, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        let to_groups = BTreeMap::from([("x".to_string(), group("x"))]);
        let matches = BTreeMap::from([("a".to_string(), group_match(Some("x"), 3, false))]);
        let snapshots = tracker.advance(&to_groups, &matches, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert_eq!(snapshots["x"].lifetime_revisions, 2);
        assert_eq!(snapshots["x"].lifetime_days, 10);
    }

    #[test]
    fn merge_conflict_only_strongest_claimant_continues() {
        let mut tracker = GroupTracker::new();
        let from_groups = BTreeMap::from([
            ("a".to_string(), group("a")),
            ("b".to_string(), group("b")),
        ]);
        tracker.seed(&from_groups, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        let to_groups = BTreeMap::from([("x".to_string(), group("x"))]);
        let matches = BTreeMap::from([
            ("a".to_string(), group_match(Some("x"), 5, true)),
            ("b".to_string(), group_match(Some("x"), 2, true)),
        ]);
        let snapshots = tracker.advance(&to_groups, &matches, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        // both claimed x with 2 lineages started at r1; the winning one
        // (a, overlap 5) extends to revision 2, so lifetime_revisions == 2.
        assert_eq!(snapshots["x"].lifetime_revisions, 2);
    }

    #[test]
    fn born_group_not_reached_by_any_match_starts_fresh() {
        let mut tracker = GroupTracker::new();
        let from_groups: BTreeMap<String, CloneGroup> = BTreeMap::new();
        tracker.seed(&from_groups, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        let to_groups = BTreeMap::from([("new".to_string(), group("new"))]);
        let snapshots = tracker.advance(&to_groups, &BTreeMap::new(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(snapshots["new"].lifetime_revisions, 1);
    }
}
