//! The evolution engine: drives `GroupDetector`,
//! `MethodMatcher`, `GroupMatcher`, and `StateClassifier` across the whole
//! revision sequence, threading lineage state through
//! [`MethodTracker`]/[`GroupTracker`] and emitting the three trace outputs.
//!
//! A struct holding configuration plus per-stage state, a single `run`
//! entry point, one `tracing::info_span!` per unit of work (here, a
//! revision pair), and a rich result struct rather than a side-channel
//! logger for anything the caller might want to inspect.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info_span, warn};

use crate::classifier::{born_groups, classify_added, classify_deleted, classify_groups, classify_survived};
use crate::core::config::EngineConfig;
use crate::core::errors::{EngineWarning, Result};
use crate::core::model::{
    CloneGroup, GroupState, GroupTraceRow, MatchType, MembershipRow, MethodMatch, MethodState,
    MethodTraceRow, Revision,
};
use crate::group_detector::detect_groups;
use crate::group_matcher::match_groups;
use crate::group_tracker::GroupTracker;
use crate::method_matcher::match_methods_bidirectional;
use crate::method_tracker::MethodTracker;
use crate::revision_source::RevisionSource;

/// Everything the engine produces from one run over a revision sequence
///: the three trace streams plus any non-fatal warnings
/// encountered along the way.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    /// One row per (revision, block_id) actually observed, plus a terminal
    /// row for each lineage at the revision in which it disappears.
    pub method_trace: Vec<MethodTraceRow>,
    /// One row per (revision, group_id) actually observed, plus a terminal
    /// row for each lineage that dissolves.
    pub group_trace: Vec<GroupTraceRow>,
    /// One row per (revision, group_id, block_id) membership snapshot.
    pub membership: Vec<MembershipRow>,
    /// Non-fatal conditions observed while processing the run.
    pub warnings: Vec<EngineWarning>,
}

/// Drives the whole evolution-tracking pipeline over an ordered revision
/// sequence. A pure function of (revision stream,
/// configuration): the only mutable state lives in the two trackers this
/// struct owns, and it is never shared outside a single `run`.
pub struct EvolutionEngine {
    config: EngineConfig,
    method_tracker: MethodTracker,
    group_tracker: GroupTracker,
}

impl EvolutionEngine {
    /// Build an engine for `config`, validating it eagerly: an invalid
    /// config is rejected before any revision pair is processed.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            method_tracker: MethodTracker::new(),
            group_tracker: GroupTracker::new(),
        })
    }

    /// Run the full pipeline over every revision `source` supplies.
    ///
    /// Recovers locally from exactly two conditions: a revision with an
    /// empty clone-pair list (singleton groups only) and a revision with
    /// zero blocks (all-deleted relative to its predecessor, all-added
    /// relative to its successor) — both fall out of the ordinary code path
    /// below without special-casing. Everything else (malformed input,
    /// missing data) propagates as `Err` from the component that detects it.
    pub fn run(&mut self, source: &dyn RevisionSource) -> Result<EngineOutput> {
        let revisions = source.revisions()?;
        let mut output = EngineOutput::default();

        let Some(first) = revisions.first() else {
            return Ok(output);
        };

        let mut prev_groups = detect_groups(first, self.config.group_threshold);
        warn_on_missing_similarities(&prev_groups, &first.revision_id, &mut output.warnings);

        self.method_tracker.seed(first);
        self.group_tracker.seed(&prev_groups, first.date);

        emit_seed_rows(first, &prev_groups, &mut output);

        for window in revisions.windows(2) {
            let from = &window[0];
            let to = &window[1];
            let _span = info_span!("revision_pair", revision_from = %from.revision_id, revision_to = %to.revision_id)
                .entered();

            let groups_to = detect_groups(to, self.config.group_threshold);
            warn_on_missing_similarities(&groups_to, &to.revision_id, &mut output.warnings);

            let match_result = match_methods_bidirectional(from, to, &self.config);
            output.warnings.extend(match_result.warnings);
            let matches_fwd = match_result.matches;

            debug!(
                pairs_evaluated = matches_fwd.len(),
                "evolution engine: method matching complete for pair"
            );

            self.process_pair(from, to, &prev_groups, &groups_to, &matches_fwd, &mut output);

            prev_groups = groups_to;
        }

        Ok(output)
    }

    #[allow(clippy::too_many_arguments)]
    fn process_pair(
        &mut self,
        from: &Revision,
        to: &Revision,
        groups_from: &BTreeMap<String, CloneGroup>,
        groups_to: &BTreeMap<String, CloneGroup>,
        matches_fwd: &BTreeMap<String, MethodMatch>,
        output: &mut EngineOutput,
    ) {
        let member_to_group_from = reverse_index(groups_from);
        let member_to_group_to = reverse_index(groups_to);

        // Invert the match map: target block_id -> (source block_id, match).
        let mut target_to_source: BTreeMap<&str, (&str, &MethodMatch)> = BTreeMap::new();
        for (source_id, m) in matches_fwd {
            if let Some(target_id) = m.target() {
                target_to_source.insert(target_id, (source_id.as_str(), m));
            }
        }

        // A new-side group "has a survivor" if any of its members is the
        // target of a successful match; an old-side group "has a survivor"
        // if any of its members matched successfully at all.
        let new_group_has_survivor: BTreeSet<&str> = target_to_source
            .keys()
            .filter_map(|target_id| member_to_group_to.get(*target_id).map(String::as_str))
            .collect();
        let old_group_has_survivor: BTreeSet<&str> = matches_fwd
            .iter()
            .filter(|(_, m)| m.target().is_some())
            .filter_map(|(source_id, _)| member_to_group_from.get(source_id).map(String::as_str))
            .collect();

        // Capture lineage snapshots for lineages that end at this pair
        // *before* advancing the trackers, since `advance` overwrites the
        // state those snapshots read from.
        let deleted_method_snaps: BTreeMap<String, _> = from
            .blocks
            .keys()
            .filter(|id| !matches!(matches_fwd.get(*id), Some(MethodMatch::Exact { .. } | MethodMatch::Fuzzy { .. })))
            .filter_map(|id| self.method_tracker.snapshot(id, from.date).map(|snap| (id.clone(), snap)))
            .collect();

        let group_matches = match_groups(groups_from, groups_to, matches_fwd, &self.config);
        let group_states = classify_groups(groups_from, groups_to, &group_matches, &self.config);
        let born = born_groups(groups_to, &group_matches);

        let dissolved_group_snaps: BTreeMap<String, _> = groups_from
            .keys()
            .filter(|id| matches!(group_states.get(*id), Some(GroupState::Dissolved)))
            .filter_map(|id| self.group_tracker.snapshot(id, from.date).map(|snap| (id.clone(), snap)))
            .collect();

        // Advance lineages now that every snapshot that needed the
        // pre-advance state has been taken.
        let method_snaps = self.method_tracker.advance(to, matches_fwd);
        let group_snaps = self.group_tracker.advance(groups_to, &group_matches, to.date);

        // --- Method trace: survived + added rows, keyed by new block_id ---
        for block in to.blocks.values() {
            let new_group = member_to_group_to.get(&block.block_id).and_then(|gid| groups_to.get(gid));

            let (state, detail, matched_block_id, match_type, match_similarity) =
                if let Some((source_id, m)) = target_to_source.get(block.block_id.as_str()) {
                    let old_group = member_to_group_from.get(*source_id).and_then(|gid| groups_from.get(gid));
                    let is_exact = m.is_exact();
                    let detail = classify_survived(is_exact, old_group, new_group);
                    let (match_type, match_similarity) = match m {
                        MethodMatch::Exact { .. } => (MatchType::Exact, None),
                        MethodMatch::Fuzzy { similarity, .. } => (MatchType::Fuzzy, Some(*similarity)),
                        MethodMatch::None => (MatchType::None, None),
                    };
                    (
                        MethodState::Survived,
                        detail,
                        Some((*source_id).to_string()),
                        match_type,
                        match_similarity,
                    )
                } else {
                    let has_survivor = new_group_has_survivor.contains(block.block_id.as_str());
                    let detail = classify_added(new_group, has_survivor);
                    (MethodState::Added, detail, None, MatchType::None, None)
                };

            let snap = method_snaps.get(&block.block_id);
            if let Some(snap) = snap {
                warn_on_zero_day(snap.lifetime_revisions, snap.lifetime_days, &to.revision_id, &block.block_id, &mut output.warnings);
            }

            output.method_trace.push(MethodTraceRow {
                revision_id: to.revision_id.clone(),
                block_id: block.block_id.clone(),
                function_name: block.function_name.clone(),
                file_path: block.file_path.clone(),
                start_line: block.start_line,
                end_line: block.end_line,
                loc: block.loc(),
                state,
                state_detail: detail,
                matched_block_id,
                match_type,
                match_similarity,
                clone_count: new_group.map_or(0, |g| g.size().saturating_sub(1)),
                clone_group_id: new_group.filter(|g| g.is_clone()).map(|g| g.group_id.clone()),
                clone_group_size: new_group.filter(|g| g.is_clone()).map(CloneGroup::size),
                lifetime_revisions: snap.map_or(1, |s| s.lifetime_revisions),
                lifetime_days: snap.map_or(0, |s| s.lifetime_days),
            });
        }

        // --- Method trace: terminal rows for deleted lineages ---
        for (block_id, snap) in &deleted_method_snaps {
            let Some(block) = from.blocks.get(block_id) else { continue };
            let old_group = member_to_group_from.get(block_id).and_then(|gid| groups_from.get(gid));
            let has_survivor = old_group_has_survivor.contains(block_id.as_str());
            let detail = classify_deleted(old_group, has_survivor);

            output.method_trace.push(MethodTraceRow {
                revision_id: to.revision_id.clone(),
                block_id: block_id.clone(),
                function_name: block.function_name.clone(),
                file_path: block.file_path.clone(),
                start_line: block.start_line,
                end_line: block.end_line,
                loc: block.loc(),
                state: MethodState::Deleted,
                state_detail: detail,
                matched_block_id: None,
                match_type: MatchType::None,
                match_similarity: None,
                clone_count: old_group.map_or(0, |g| g.size().saturating_sub(1)),
                clone_group_id: old_group.filter(|g| g.is_clone()).map(|g| g.group_id.clone()),
                clone_group_size: old_group.filter(|g| g.is_clone()).map(CloneGroup::size),
                lifetime_revisions: snap.lifetime_revisions,
                lifetime_days: snap.lifetime_days,
            });
        }

        // --- Group trace + membership: rows for every group in `to` ---
        for group in groups_to.values() {
            let state = if born.contains(&group.group_id) {
                GroupState::Born
            } else {
                // Reverse-lookup: which source group accepted this group as
                // its target (if any)?
                group_matches
                    .iter()
                    .find(|(_, m)| m.target_group_id.as_deref() == Some(group.group_id.as_str()))
                    .and_then(|(source_id, _)| group_states.get(source_id))
                    .copied()
                    .unwrap_or(GroupState::Born)
            };

            let matched_source = group_matches
                .iter()
                .find(|(_, m)| m.target_group_id.as_deref() == Some(group.group_id.as_str()));

            let (matched_group_id, overlap_ratio, member_added, member_removed) = match matched_source {
                None => (None, None, group.size(), 0),
                Some((source_id, m)) => {
                    let source_group = groups_from.get(source_id);
                    let member_added = group
                        .members
                        .iter()
                        .filter(|member| {
                            let survivor = target_to_source
                                .get(member.as_str())
                                .is_some_and(|(src, _)| source_group.is_some_and(|sg| sg.members.contains(*src)));
                            !survivor
                        })
                        .count();
                    let member_removed = source_group.map_or(0, |sg| {
                        sg.members
                            .iter()
                            .filter(|member| {
                                let survived_into_this_group = matches_fwd
                                    .get(*member)
                                    .and_then(MethodMatch::target)
                                    .is_some_and(|target| group.members.contains(target));
                                !survived_into_this_group
                            })
                            .count()
                    });
                    (Some(source_id.clone()), Some(m.overlap_ratio), member_added, member_removed)
                }
            };

            let snap = group_snaps.get(&group.group_id);
            output.group_trace.push(GroupTraceRow {
                revision_id: to.revision_id.clone(),
                group_id: group.group_id.clone(),
                member_count: group.size(),
                avg_similarity: group.avg_similarity(),
                min_similarity: group.min_similarity(),
                max_similarity: group.max_similarity(),
                density: group.density(),
                state,
                matched_group_id,
                overlap_ratio,
                member_added,
                member_removed,
                lifetime_revisions: snap.map_or(1, |s| s.lifetime_revisions),
                lifetime_days: snap.map_or(0, |s| s.lifetime_days),
            });

            for member in &group.members {
                let function_name = to.blocks.get(member).map_or_else(String::new, |b| b.function_name.clone());
                output.membership.push(MembershipRow {
                    revision_id: to.revision_id.clone(),
                    group_id: group.group_id.clone(),
                    block_id: member.clone(),
                    function_name,
                    is_clone: group.is_clone(),
                });
            }
        }

        // --- Group trace: terminal rows for dissolved lineages ---
        for (group_id, snap) in &dissolved_group_snaps {
            let Some(group) = groups_from.get(group_id) else { continue };
            output.group_trace.push(GroupTraceRow {
                revision_id: to.revision_id.clone(),
                group_id: group_id.clone(),
                member_count: group.size(),
                avg_similarity: group.avg_similarity(),
                min_similarity: group.min_similarity(),
                max_similarity: group.max_similarity(),
                density: group.density(),
                state: GroupState::Dissolved,
                matched_group_id: None,
                overlap_ratio: None,
                member_added: 0,
                member_removed: group.size(),
                lifetime_revisions: snap.lifetime_revisions,
                lifetime_days: snap.lifetime_days,
            });
        }
    }
}

fn reverse_index(groups: &BTreeMap<String, CloneGroup>) -> BTreeMap<String, String> {
    groups
        .values()
        .flat_map(|g| g.members.iter().map(move |m| (m.clone(), g.group_id.clone())))
        .collect()
}

fn emit_seed_rows(first: &Revision, groups: &BTreeMap<String, CloneGroup>, output: &mut EngineOutput) {
    let member_to_group = reverse_index(groups);
    for block in first.blocks.values() {
        let group = member_to_group.get(&block.block_id).and_then(|gid| groups.get(gid));
        let detail = classify_added(group, false);
        output.method_trace.push(MethodTraceRow {
            revision_id: first.revision_id.clone(),
            block_id: block.block_id.clone(),
            function_name: block.function_name.clone(),
            file_path: block.file_path.clone(),
            start_line: block.start_line,
            end_line: block.end_line,
            loc: block.loc(),
            state: MethodState::Added,
            state_detail: detail,
            matched_block_id: None,
            match_type: MatchType::None,
            match_similarity: None,
            clone_count: group.map_or(0, |g| g.size().saturating_sub(1)),
            clone_group_id: group.filter(|g| g.is_clone()).map(|g| g.group_id.clone()),
            clone_group_size: group.filter(|g| g.is_clone()).map(CloneGroup::size),
            lifetime_revisions: 1,
            lifetime_days: 0,
        });
    }

    for group in groups.values() {
        output.group_trace.push(GroupTraceRow {
            revision_id: first.revision_id.clone(),
            group_id: group.group_id.clone(),
            member_count: group.size(),
            avg_similarity: group.avg_similarity(),
            min_similarity: group.min_similarity(),
            max_similarity: group.max_similarity(),
            density: group.density(),
            state: GroupState::Born,
            matched_group_id: None,
            overlap_ratio: None,
            member_added: group.size(),
            member_removed: 0,
            lifetime_revisions: 1,
            lifetime_days: 0,
        });
        for member in &group.members {
            let function_name = first.blocks.get(member).map_or_else(String::new, |b| b.function_name.clone());
            output.membership.push(MembershipRow {
                revision_id: first.revision_id.clone(),
                group_id: group.group_id.clone(),
                block_id: member.clone(),
                function_name,
                is_clone: group.is_clone(),
            });
        }
    }
}

fn warn_on_missing_similarities(groups: &BTreeMap<String, CloneGroup>, revision_id: &str, warnings: &mut Vec<EngineWarning>) {
    for group in groups.values() {
        if group.is_clone() && group.pair_similarities.is_empty() {
            let warning = EngineWarning::GroupMissingSimilarities {
                revision_id: revision_id.to_string(),
                group_id: group.group_id.clone(),
            };
            warn!("{warning}");
            warnings.push(warning);
        }
    }
}

fn warn_on_zero_day(lifetime_revisions: u32, lifetime_days: i64, revision_id: &str, lineage_id: &str, warnings: &mut Vec<EngineWarning>) {
    if lifetime_revisions > 1 && lifetime_days == 0 {
        let warning = EngineWarning::ZeroDayLifetime {
            revision_id: revision_id.to_string(),
            lineage_id: lineage_id.to_string(),
        };
        warn!("{warning}");
        warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ClonePair, CodeBlock, Parameter};
    use crate::revision_source::InMemoryRevisionSource;
    use chrono::NaiveDate;

    fn block(id: &str, tokens: &[i64], hash: u64) -> CodeBlock {
        CodeBlock {
            block_id: id.to_string(),
            file_path: "f.rs".to_string(),
            start_line: 1,
            end_line: 10,
            function_name: id.to_string(),
            return_type: "()".to_string(),
            parameter_list: Vec::<Parameter>::new(),
            token_hash: hash,
            token_sequence: tokens.to_vec(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Scenario A: identical revision, both blocks survive unchanged.
    #[test]
    fn scenario_a_identical_revision() {
        let mut r1 = Revision::new("r1", date(2024, 1, 1));
        r1.blocks.insert("b1".into(), block("b1", &[1, 2, 3], 42));
        r1.blocks.insert("b2".into(), block("b2", &[4, 5, 6], 99));

        let mut r2 = Revision::new("r2", date(2024, 1, 2));
        r2.blocks.insert("b1p".into(), block("b1p", &[1, 2, 3], 42));
        r2.blocks.insert("b2p".into(), block("b2p", &[4, 5, 6], 99));

        let source = InMemoryRevisionSource::new(vec![r1, r2]);
        let mut engine = EvolutionEngine::new(EngineConfig::default()).unwrap();
        let output = engine.run(&source).unwrap();

        let r2_rows: Vec<_> = output
            .method_trace
            .iter()
            .filter(|row| row.revision_id == "r2")
            .collect();
        assert_eq!(r2_rows.len(), 2);
        for row in &r2_rows {
            assert_eq!(row.state, MethodState::Survived);
            assert_eq!(row.state_detail, crate::core::model::MethodStateDetail::SurvivedUnchanged);
            assert_eq!(row.lifetime_revisions, 2);
        }
    }

    // Scenario C: deletion and addition in the same pair.
    #[test]
    fn scenario_c_deletion_and_addition() {
        let mut r1 = Revision::new("r1", date(2024, 1, 1));
        r1.blocks.insert("x".into(), block("x", &[1, 2, 3], 1));
        r1.blocks.insert("y".into(), block("y", &[4, 5, 6], 2));
        r1.blocks.insert("z".into(), block("z", &[7, 8, 9], 3));

        let mut r2 = Revision::new("r2", date(2024, 1, 2));
        r2.blocks.insert("x2".into(), block("x2", &[1, 2, 3], 1));
        r2.blocks.insert("w".into(), block("w", &[900, 901, 902], 4));

        let source = InMemoryRevisionSource::new(vec![r1, r2]);
        let mut engine = EvolutionEngine::new(EngineConfig::default()).unwrap();
        let output = engine.run(&source).unwrap();

        let r2_rows: BTreeMap<&str, &MethodTraceRow> = output
            .method_trace
            .iter()
            .filter(|row| row.revision_id == "r2")
            .map(|row| (row.block_id.as_str(), row))
            .collect();

        assert_eq!(r2_rows["x2"].state, MethodState::Survived);
        assert_eq!(r2_rows["w"].state, MethodState::Added);
        assert_eq!(r2_rows["y"].state, MethodState::Deleted);
        assert_eq!(r2_rows["z"].state, MethodState::Deleted);
    }

    // Scenario D: a clone group dissolves when only one member survives.
    #[test]
    fn scenario_d_group_dissolution() {
        let mut r1 = Revision::new("r1", date(2024, 1, 1));
        r1.blocks.insert("a".into(), block("a", &[1, 2, 3], 1));
        r1.blocks.insert("b".into(), block("b", &[1, 2, 4], 2));
        r1.blocks.insert("c".into(), block("c", &[1, 2, 5], 3));
        r1.clone_pairs.push(ClonePair { block_id_1: "a".into(), block_id_2: "b".into(), ngram_similarity: 80, lcs_similarity: None });
        r1.clone_pairs.push(ClonePair { block_id_1: "b".into(), block_id_2: "c".into(), ngram_similarity: 85, lcs_similarity: None });
        r1.clone_pairs.push(ClonePair { block_id_1: "a".into(), block_id_2: "c".into(), ngram_similarity: 82, lcs_similarity: None });

        let mut r2 = Revision::new("r2", date(2024, 1, 2));
        r2.blocks.insert("a2".into(), block("a2", &[1, 2, 3], 1));

        let source = InMemoryRevisionSource::new(vec![r1, r2]);
        let mut engine = EvolutionEngine::new(EngineConfig::default()).unwrap();
        let output = engine.run(&source).unwrap();

        let r2_rows: BTreeMap<&str, &MethodTraceRow> = output
            .method_trace
            .iter()
            .filter(|row| row.revision_id == "r2")
            .map(|row| (row.block_id.as_str(), row))
            .collect();
        assert_eq!(r2_rows["a2"].state_detail, crate::core::model::MethodStateDetail::SurvivedCloneLost);
        assert_eq!(r2_rows["b"].state, MethodState::Deleted);
        assert_eq!(r2_rows["c"].state, MethodState::Deleted);

        let dissolved = output
            .group_trace
            .iter()
            .find(|row| row.revision_id == "r2" && row.state == GroupState::Dissolved);
        assert!(dissolved.is_some());
    }

    #[test]
    fn empty_source_produces_empty_output() {
        let source = InMemoryRevisionSource::new(vec![]);
        let mut engine = EvolutionEngine::new(EngineConfig::default()).unwrap();
        let output = engine.run(&source).unwrap();
        assert!(output.method_trace.is_empty());
        assert!(output.group_trace.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut config = EngineConfig::default();
        config.similarity_threshold = 150;
        assert!(EvolutionEngine::new(config).is_err());
    }
}
