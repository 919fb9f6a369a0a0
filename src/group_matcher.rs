//! Cross-revision clone-group matching: project each source group's
//! members through the method matches onto the target revision's groups,
//! and accept the best-overlap candidate when it clears `overlap_threshold`.
//!
//! Split and merge are derived, not primary: a source group is a split when
//! *two or more* target groups each individually clear `overlap_threshold`
//! for that source's members (the members didn't converge on one target); a
//! target group is a merge when two or more source groups both accept it as
//! their match.

use std::collections::BTreeMap;

use crate::core::config::EngineConfig;
use crate::core::model::{CloneGroup, GroupMatch, MethodMatch};

/// Match every group in `from_groups` against `to_groups`, using
/// `method_matches` (source block_id -> [`MethodMatch`]) to project
/// membership across the revision boundary.
#[must_use]
pub fn match_groups(
    from_groups: &BTreeMap<String, CloneGroup>,
    to_groups: &BTreeMap<String, CloneGroup>,
    method_matches: &BTreeMap<String, MethodMatch>,
    config: &EngineConfig,
) -> BTreeMap<String, GroupMatch> {
    let member_to_group: BTreeMap<String, String> = to_groups
        .values()
        .flat_map(|group| group.members.iter().map(move |m| (m.clone(), group.group_id.clone())))
        .collect();

    let mut results: BTreeMap<String, GroupMatch> = BTreeMap::new();

    for (source_id, source_group) in from_groups {
        let mut overlap_counts: BTreeMap<String, usize> = BTreeMap::new();
        for member in &source_group.members {
            let Some(target) = method_matches.get(member).and_then(MethodMatch::target) else {
                continue;
            };
            if let Some(target_group_id) = member_to_group.get(target) {
                *overlap_counts.entry(target_group_id.clone()).or_insert(0) += 1;
            }
        }

        let source_size = source_group.size();

        // Every target that individually clears overlap_threshold, ranked by
        // ratio descending then target group_id ascending.
        let mut qualifying: Vec<(String, usize, f64)> = overlap_counts
            .iter()
            .map(|(id, count)| (id.clone(), *count, *count as f64 / source_size.max(1) as f64))
            .filter(|(_, _, ratio)| *ratio >= config.overlap_threshold)
            .collect();
        qualifying.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap().then_with(|| a.0.cmp(&b.0)));

        let group_match = match qualifying.first() {
            None => GroupMatch {
                target_group_id: None,
                overlap_count: 0,
                overlap_ratio: 0.0,
                source_size,
                target_size: 0,
                split: false,
                merge: false,
            },
            Some((best_id, best_count, ratio)) => GroupMatch {
                target_size: to_groups.get(best_id).map_or(0, CloneGroup::size),
                target_group_id: Some(best_id.clone()),
                overlap_count: *best_count,
                overlap_ratio: *ratio,
                source_size,
                // Split: two or more distinct targets each individually
                // clear overlap_threshold for this source's members.
                split: qualifying.len() >= 2,
                merge: false,
            },
        };

        results.insert(source_id.clone(), group_match);
    }

    // Merge detection: any accepted target claimed by two or more sources.
    let mut claim_counts: BTreeMap<String, usize> = BTreeMap::new();
    for group_match in results.values() {
        if let Some(target) = &group_match.target_group_id {
            *claim_counts.entry(target.clone()).or_insert(0) += 1;
        }
    }
    for group_match in results.values_mut() {
        if let Some(target) = &group_match.target_group_id {
            if claim_counts.get(target).copied().unwrap_or(0) >= 2 {
                group_match.merge = true;
            }
        }
    }

    results
}
