//! Cross-revision method matching: for every block in the source
//! revision, find its counterpart (if any) in the target revision.
//!
//! Two phases. First, an exact phase matches on `token_hash` equality —
//! cheap and unambiguous. Second, a fuzzy phase ranks each still-unmatched
//! source block's candidates by similarity and reconciles them against the
//! target pool in descending-threshold passes, so a stricter pass never
//! loses a good match to a greedy weaker one claiming the same target.
//!
//! The per-source candidate search is the expensive step and is
//! embarrassingly parallel; reconciliation (claiming targets) is inherently
//! sequential: compute independently in parallel, then fold the results
//! together on one thread rather than share a lock.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use tracing::debug;

use crate::core::config::{EngineConfig, ParallelMode};
use crate::core::errors::EngineWarning;
use crate::core::model::{CodeBlock, MethodMatch, Revision};
use crate::lsh::{LshIndex, MinHashSignature};
use crate::similarity::{combined, default_band, ngram_similarity, token_set_jaccard, DEFAULT_NGRAM_SIZE};

/// Outcome of matching one revision pair's methods.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Match outcome for every block_id in the source revision
    pub matches: BTreeMap<String, MethodMatch>,
    /// Non-fatal conditions observed while matching
    pub warnings: Vec<EngineWarning>,
}

/// A ranked fuzzy candidate: target block_id and similarity, 0-100.
type Candidate = (String, u8);

/// Match every block of `from` against `to`.
#[must_use]
pub fn match_methods(from: &Revision, to: &Revision, config: &EngineConfig) -> MatchResult {
    let mut matches: BTreeMap<String, MethodMatch> = BTreeMap::new();
    let mut unmatched: Vec<&CodeBlock> = Vec::new();

    // Phase 1: exact match by token_hash. Keep only the first target seen
    // per hash (by block_id) as the representative; later same-hash
    // targets are left for the fuzzy phase like any other unclaimed
    // target. A target already claimed by an earlier source is never
    // reused, preserving injectivity: no target is matched twice.
    let mut by_hash: BTreeMap<u64, String> = BTreeMap::new();
    for block in to.blocks.values() {
        by_hash.entry(block.token_hash).or_insert_with(|| block.block_id.clone());
    }

    let mut claimed_targets: BTreeSet<String> = BTreeSet::new();
    for block in from.blocks.values() {
        match by_hash.get(&block.token_hash) {
            Some(target) if !claimed_targets.contains(target) => {
                matches.insert(
                    block.block_id.clone(),
                    MethodMatch::Exact {
                        target: target.clone(),
                    },
                );
                claimed_targets.insert(target.clone());
            }
            _ => unmatched.push(block),
        }
    }

    debug!(
        exact_matches = matches.len(),
        remaining = unmatched.len(),
        "method matcher: exact phase complete"
    );

    // Phase 2: fuzzy match for everything exact matching missed, restricted
    // to targets the exact phase did not already claim.
    if !unmatched.is_empty() {
        let available: Vec<&CodeBlock> = to
            .blocks
            .values()
            .filter(|b| !claimed_targets.contains(&b.block_id))
            .collect();
        let candidates_by_source = rank_candidates(&unmatched, &available, config);
        reconcile(&mut matches, candidates_by_source, config, claimed_targets);
    }

    for block in from.blocks.keys() {
        matches.entry(block.clone()).or_insert(MethodMatch::None);
    }

    let mut warnings = Vec::new();
    if !from.blocks.is_empty() {
        let matched = matches.values().filter(|m| !matches!(m, MethodMatch::None)).count();
        let rate = matched as f64 / from.blocks.len() as f64;
        if rate < config.min_match_rate_floor {
            warnings.push(EngineWarning::LowMatchRate {
                revision_id: to.revision_id.clone(),
                rate,
                floor: config.min_match_rate_floor,
            });
        }
    }

    MatchResult { matches, warnings }
}

/// Match `from` against `to`, then run the mirror direction (`to` against
/// `from`) to recover reciprocal matches the forward pass's greedy claim
/// order left on the table: per §2's data flow, `MethodMatcher` runs in
/// both directions for each revision pair. A forward-unmatched source is
/// accepted only when the backward pass's own best match for some target
/// points back to that exact source and the target is still unclaimed —
/// a reciprocal-best-match reconciliation, not a blind union of both
/// passes' claims, so injectivity is preserved and every already-settled
/// forward match is left untouched.
#[must_use]
pub fn match_methods_bidirectional(from: &Revision, to: &Revision, config: &EngineConfig) -> MatchResult {
    let mut forward = match_methods(from, to, config);
    let backward = match_methods(to, from, config);

    let mut claimed_targets: BTreeSet<String> = forward
        .matches
        .values()
        .filter_map(MethodMatch::target)
        .map(ToString::to_string)
        .collect();

    // Backward matches are keyed by target-as-source (a block in `to`); its
    // own target (if any) lives in `from`. Since match_methods never claims
    // a target twice within one call, each `from`-side block appears as a
    // backward target at most once, so this map is naturally injective.
    let mut reciprocal_by_source: BTreeMap<String, (String, MethodMatch)> = BTreeMap::new();
    for (target_id, m) in &backward.matches {
        if let Some(source_id) = m.target() {
            let mirrored = match m {
                MethodMatch::Exact { .. } => MethodMatch::Exact { target: target_id.clone() },
                MethodMatch::Fuzzy { similarity, .. } => {
                    MethodMatch::Fuzzy { target: target_id.clone(), similarity: *similarity }
                }
                MethodMatch::None => continue,
            };
            reciprocal_by_source.insert(source_id.to_string(), (target_id.clone(), mirrored));
        }
    }

    for (source_id, current) in forward.matches.iter_mut() {
        if !matches!(current, MethodMatch::None) {
            continue;
        }
        if let Some((target_id, mirrored)) = reciprocal_by_source.get(source_id) {
            if !claimed_targets.contains(target_id) {
                *current = mirrored.clone();
                claimed_targets.insert(target_id.clone());
            }
        }
    }

    forward.warnings.extend(backward.warnings);
    forward
}

/// Build, for every unmatched source block, a similarity-ranked candidate
/// list drawn from `available` targets (via LSH if configured, else brute
/// force), filtered by the length-ratio skip and Jaccard prefilter.
fn rank_candidates(
    unmatched: &[&CodeBlock],
    available: &[&CodeBlock],
    config: &EngineConfig,
) -> BTreeMap<String, Vec<Candidate>> {
    let matcher = &config.matcher;

    let by_id: BTreeMap<&str, &CodeBlock> =
        available.iter().map(|b| (b.block_id.as_str(), *b)).collect();

    let lsh_index = if matcher.use_lsh {
        let mut index = LshIndex::new(&config.lsh);
        for block in available {
            index.insert(
                block.block_id.clone(),
                MinHashSignature::compute(&block.token_sequence, config.lsh.num_permutations),
            );
        }
        Some(index)
    } else {
        None
    };

    let should_parallelize = match matcher.parallel {
        ParallelMode::On => true,
        ParallelMode::Off => false,
        ParallelMode::Auto => unmatched.len() * available.len() >= matcher.parallel_min_pairs,
    };

    let compute_one = |source: &&CodeBlock| -> (String, Vec<Candidate>) {
        let pool: Vec<&CodeBlock> = match &lsh_index {
            // `source` belongs to the other revision and was never
            // inserted into `lsh_index` (only `available`/target blocks
            // were) — query by a freshly computed signature, not by id.
            Some(index) => {
                let signature =
                    MinHashSignature::compute(&source.token_sequence, config.lsh.num_permutations);
                index
                    .query_signature(&signature)
                    .into_iter()
                    .take(matcher.top_k)
                    .filter_map(|(target_id, _)| by_id.get(target_id.as_str()).copied())
                    .collect()
            }
            None => available.to_vec(),
        };

        let mut candidates: Vec<Candidate> = pool
            .into_iter()
            .filter(|target| passes_prefilters(source, target, matcher))
            .map(|target| {
                let similarity = score_pair(source, target, matcher, config.similarity_threshold);
                (target.block_id.clone(), similarity)
            })
            .collect();

        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        // top_k only bounds the search space when LSH is enabled (§4.5): the
        // LSH-restricted pool is already capped above, so this just drops
        // any stragglers that crept in from overlapping band buckets. The
        // brute-force (non-LSH) path evaluates every candidate that passed
        // the prefilters, matching the spec's O(|S|*|T|*L^2) worst case.
        if matcher.use_lsh {
            candidates.truncate(matcher.top_k);
        }
        (source.block_id.clone(), candidates)
    };

    if should_parallelize {
        unmatched
            .par_iter()
            .map(compute_one)
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    } else {
        unmatched.iter().map(compute_one).collect()
    }
}

fn passes_prefilters(
    source: &CodeBlock,
    target: &CodeBlock,
    matcher: &crate::core::config::MatcherConfig,
) -> bool {
    let len_a = source.token_sequence.len();
    let len_b = target.token_sequence.len();
    if len_a == 0 && len_b == 0 {
        return true;
    }
    // |len_a - len_b| / max(len_a, len_b): skip pairs whose lengths have
    // drifted apart by more than length_skip_ratio.
    let longer = len_a.max(len_b).max(1);
    let diff_ratio = len_a.max(len_b).abs_diff(len_a.min(len_b)) as f64 / longer as f64;
    if diff_ratio > matcher.length_skip_ratio {
        return false;
    }
    token_set_jaccard(&source.token_sequence, &target.token_sequence) >= matcher.jaccard_prefilter
}

fn score_pair(
    source: &CodeBlock,
    target: &CodeBlock,
    matcher: &crate::core::config::MatcherConfig,
    threshold: u8,
) -> u8 {
    // Cheap n-gram-only score for LSH top-k ranking; the real candidate
    // score used for acceptance comes from `combined` in `rank_candidates`.
    if !matcher.banded_lcs {
        return combined(&source.token_sequence, &target.token_sequence, threshold, None);
    }
    let band = default_band(source.token_sequence.len(), target.token_sequence.len());
    combined(&source.token_sequence, &target.token_sequence, threshold, Some(band))
}

/// Reconcile ranked candidate lists against the target pool in
/// descending-threshold passes, each pass claiming targets greedily in
/// source block_id order for determinism.
fn reconcile(
    matches: &mut BTreeMap<String, MethodMatch>,
    candidates_by_source: BTreeMap<String, Vec<Candidate>>,
    config: &EngineConfig,
    mut claimed_targets: BTreeSet<String>,
) {
    let mut thresholds = config.matcher.progressive_thresholds.clone();
    if thresholds.is_empty() {
        thresholds.push(config.similarity_threshold);
    }
    thresholds.sort_unstable_by(|a, b| b.cmp(a));

    let mut still_unmatched: BTreeSet<String> = candidates_by_source.keys().cloned().collect();

    for threshold in thresholds {
        let effective_threshold = threshold.max(config.similarity_threshold);
        let sources: Vec<String> = still_unmatched.iter().cloned().collect();
        for source_id in sources {
            let Some(candidates) = candidates_by_source.get(&source_id) else {
                continue;
            };
            let pick = candidates
                .iter()
                .find(|(target, sim)| *sim >= effective_threshold && !claimed_targets.contains(target));
            if let Some((target, similarity)) = pick {
                matches.insert(
                    source_id.clone(),
                    MethodMatch::Fuzzy {
                        target: target.clone(),
                        similarity: *similarity,
                    },
                );
                claimed_targets.insert(target.clone());
                still_unmatched.remove(&source_id);
            }
        }
    }
}
