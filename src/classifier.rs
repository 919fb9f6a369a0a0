//! Lifecycle state classification: turn match outcomes into the
//! refined [`MethodStateDetail`] and [`GroupState`] labels that trace rows
//! report.

use std::collections::BTreeMap;

use crate::core::config::EngineConfig;
use crate::core::model::{CloneGroup, GroupMatch, GroupState, MethodMatch, MethodStateDetail};

/// Classify a survived block (exact or fuzzy match found) using its clone
/// group membership on both sides of the match.
///
/// `source_group` is the block's group in the revision it was matched
/// *from*; `target_group` is the matched block's group in the revision it
/// was matched *into*. Either may be `None` for a block the group detector
/// did not place (should not happen in practice, since every block is at
/// minimum a singleton group, but handled defensively).
#[must_use]
pub fn classify_survived(
    is_exact: bool,
    source_group: Option<&CloneGroup>,
    target_group: Option<&CloneGroup>,
) -> MethodStateDetail {
    let source_is_clone = source_group.is_some_and(CloneGroup::is_clone);
    let target_is_clone = target_group.is_some_and(CloneGroup::is_clone);

    if is_exact {
        let source_size = source_group.map_or(1, CloneGroup::size);
        let target_size = target_group.map_or(1, CloneGroup::size);
        match (source_is_clone, target_is_clone) {
            (false, false) => MethodStateDetail::SurvivedUnchanged,
            (false, true) => MethodStateDetail::SurvivedCloneGained,
            (true, false) => MethodStateDetail::SurvivedCloneLost,
            (true, true) if target_size > source_size => MethodStateDetail::SurvivedCloneGained,
            (true, true) => MethodStateDetail::SurvivedCloneLost,
        }
    } else if source_is_clone || target_is_clone {
        MethodStateDetail::SurvivedModifiedClone
    } else {
        MethodStateDetail::SurvivedModifiedUnchanged
    }
}

/// Classify an added block (present only in the new revision) using its
/// clone group and whether that group contains any survivors.
#[must_use]
pub fn classify_added(group: Option<&CloneGroup>, group_has_survivor: bool) -> MethodStateDetail {
    match group {
        None => MethodStateDetail::AddedIsolated,
        Some(g) if !g.is_clone() => MethodStateDetail::AddedIsolated,
        Some(_) if group_has_survivor => MethodStateDetail::AddedToGroup,
        Some(_) => MethodStateDetail::AddedNewGroup,
    }
}

/// Classify a deleted block (present only in the old revision) using its
/// clone group and whether any other member of that group survives.
#[must_use]
pub fn classify_deleted(group: Option<&CloneGroup>, group_has_survivor: bool) -> MethodStateDetail {
    match group {
        None => MethodStateDetail::DeletedIsolated,
        Some(g) if !g.is_clone() => MethodStateDetail::DeletedIsolated,
        Some(_) if group_has_survivor => MethodStateDetail::DeletedFromGroup,
        Some(_) => MethodStateDetail::DeletedLastMember,
    }
}

/// Classify every group in `from_groups` using its [`GroupMatch`] against
/// `to_groups`, applying `group_size_tolerance` to distinguish Continued
/// from Grown/Shrunk.
#[must_use]
pub fn classify_groups(
    from_groups: &BTreeMap<String, CloneGroup>,
    to_groups: &BTreeMap<String, CloneGroup>,
    group_matches: &BTreeMap<String, GroupMatch>,
    config: &EngineConfig,
) -> BTreeMap<String, GroupState> {
    let mut states = BTreeMap::new();

    for (source_id, source_group) in from_groups {
        let Some(group_match) = group_matches.get(source_id) else {
            states.insert(source_id.clone(), GroupState::Dissolved);
            continue;
        };

        let state = if group_match.split {
            GroupState::Split
        } else if group_match.merge {
            GroupState::Merged
        } else {
            match &group_match.target_group_id {
                None => GroupState::Dissolved,
                Some(target_id) => {
                    let target_size = to_groups.get(target_id).map_or(0, CloneGroup::size);
                    classify_size_change(source_group.size(), target_size, config.group_size_tolerance)
                }
            }
        };
        states.insert(source_id.clone(), state);
    }

    states
}

fn classify_size_change(source_size: usize, target_size: usize, tolerance: f64) -> GroupState {
    if source_size == 0 {
        return GroupState::Continued;
    }
    let delta = (target_size as f64 - source_size as f64) / source_size as f64;
    if delta > tolerance {
        GroupState::Grown
    } else if delta < -tolerance {
        GroupState::Shrunk
    } else {
        GroupState::Continued
    }
}

/// Groups in `to_groups` that had no predecessor among `group_matches`'
/// accepted targets are Born.
#[must_use]
pub fn born_groups(
    to_groups: &BTreeMap<String, CloneGroup>,
    group_matches: &BTreeMap<String, GroupMatch>,
) -> Vec<String> {
    let matched_targets: std::collections::BTreeSet<&String> = group_matches
        .values()
        .filter_map(|m| m.target_group_id.as_ref())
        .collect();
    to_groups
        .keys()
        .filter(|id| !matched_targets.contains(id))
        .cloned()
        .collect()
}
