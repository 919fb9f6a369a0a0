//! Intra-revision clone-group detection: build the similarity graph
//! implied by a revision's recorded clone pairs and extract connected
//! components as [`CloneGroup`]s via [`DisjointSet`].

use std::collections::BTreeMap;

use crate::core::model::{CloneGroup, ClonePair, Revision};
use crate::disjoint_set::DisjointSet;

/// Detect clone groups for `revision`, unioning any pair whose effective
/// similarity meets `group_threshold`. Every code block appears in exactly
/// one group; blocks with no qualifying pair form singleton groups (not
/// clones, but still tracked so the method tracker can report group state
/// transitions uniformly).
#[must_use]
pub fn detect_groups(revision: &Revision, group_threshold: u8) -> BTreeMap<String, CloneGroup> {
    let mut ds = DisjointSet::new();
    for block_id in revision.blocks.keys() {
        ds.make_set(block_id);
    }

    let qualifying: Vec<&ClonePair> = revision
        .clone_pairs
        .iter()
        .filter(|pair| pair.effective_similarity() >= group_threshold)
        .collect();

    for pair in &qualifying {
        ds.union(&pair.block_id_1, &pair.block_id_2);
    }

    let components = ds.groups();
    let mut groups = BTreeMap::new();

    for (root, mut members) in components {
        members.sort();
        let group_id = members
            .iter()
            .min()
            .cloned()
            .unwrap_or_else(|| root.clone());

        let member_set: std::collections::BTreeSet<String> = members.into_iter().collect();
        let mut pair_similarities = BTreeMap::new();
        for pair in &qualifying {
            if member_set.contains(&pair.block_id_1) && member_set.contains(&pair.block_id_2) {
                pair_similarities.insert(pair.key(), pair.effective_similarity());
            }
        }

        groups.insert(
            group_id.clone(),
            CloneGroup {
                group_id,
                members: member_set,
                pair_similarities,
            },
        );
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{CodeBlock, Parameter};
    use chrono::NaiveDate;

    fn block(id: &str) -> CodeBlock {
        CodeBlock {
            block_id: id.to_string(),
            file_path: "f.rs".to_string(),
            start_line: 1,
            end_line: 10,
            function_name: id.to_string(),
            return_type: "()".to_string(),
            parameter_list: Vec::<Parameter>::new(),
            token_hash: 0,
            token_sequence: Vec::new(),
        }
    }

    fn revision_with(blocks: &[&str], pairs: &[(&str, &str, u8)]) -> Revision {
        let mut revision = Revision::new("r1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        for id in blocks {
            revision.blocks.insert(id.to_string(), block(id));
        }
        for (a, b, sim) in pairs {
            revision.clone_pairs.push(ClonePair {
                block_id_1: a.to_string(),
                block_id_2: b.to_string(),
                ngram_similarity: *sim,
                lcs_similarity: None,
            });
        }
        revision
    }

    #[test]
    fn blocks_with_no_pairs_are_singleton_groups() {
        let revision = revision_with(&["a", "b"], &[]);
        let groups = detect_groups(&revision, 70);
        assert_eq!(groups.len(), 2);
        for group in groups.values() {
            assert!(!group.is_clone());
        }
    }

    #[test]
    fn qualifying_pair_merges_into_one_group() {
        let revision = revision_with(&["a", "b"], &[("a", "b", 90)]);
        let groups = detect_groups(&revision, 70);
        assert_eq!(groups.len(), 1);
        let group = groups.values().next().unwrap();
        assert_eq!(group.group_id, "a");
        assert!(group.is_clone());
        assert_eq!(group.size(), 2);
    }

    #[test]
    fn below_threshold_pair_does_not_merge() {
        let revision = revision_with(&["a", "b"], &[("a", "b", 50)]);
        let groups = detect_groups(&revision, 70);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn transitive_pairs_form_one_group() {
        let revision = revision_with(
            &["a", "b", "c"],
            &[("a", "b", 90), ("b", "c", 85)],
        );
        let groups = detect_groups(&revision, 70);
        assert_eq!(groups.len(), 1);
        let group = groups.values().next().unwrap();
        assert_eq!(group.size(), 3);
        assert_eq!(group.pair_similarities.len(), 2);
    }

    #[test]
    fn group_id_is_lexicographically_smallest_member() {
        let revision = revision_with(&["z", "a"], &[("z", "a", 90)]);
        let groups = detect_groups(&revision, 70);
        assert_eq!(groups.keys().next().unwrap(), "a");
    }
}
