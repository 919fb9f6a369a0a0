//! Core data model shared by every component of the engine.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Build the canonical, order-independent key for a pair of block or group
/// ids: the lexicographically smaller id first.
#[must_use]
pub fn unordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// One named, typed parameter in a method signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type, as recorded by the producer (opaque to the engine)
    pub type_name: String,
}

/// One method in one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Opaque identifier, unique within its revision
    pub block_id: String,
    /// Path to the file containing this block
    pub file_path: String,
    /// First source line, inclusive
    pub start_line: u32,
    /// Last source line, inclusive
    pub end_line: u32,
    /// Function or method name
    pub function_name: String,
    /// Declared return type, as recorded by the producer
    pub return_type: String,
    /// Ordered parameter list
    pub parameter_list: Vec<Parameter>,
    /// Short digest of the whole token sequence
    pub token_hash: u64,
    /// Ordered integer-encoded token sequence
    pub token_sequence: Vec<i64>,
}

impl CodeBlock {
    /// Lines of code, inclusive of both endpoints.
    #[must_use]
    pub fn loc(&self) -> u32 {
        self.end_line - self.start_line + 1
    }
}

/// A recorded intra-revision similarity between two blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClonePair {
    /// First endpoint
    pub block_id_1: String,
    /// Second endpoint
    pub block_id_2: String,
    /// n-gram similarity, 0-100
    pub ngram_similarity: u8,
    /// LCS similarity, 0-100; absent when the producer skipped it because
    /// `ngram_similarity` already met the threshold
    pub lcs_similarity: Option<u8>,
}

impl ClonePair {
    /// The canonical, order-independent key for this pair.
    #[must_use]
    pub fn key(&self) -> (String, String) {
        unordered_pair(&self.block_id_1, &self.block_id_2)
    }

    /// Effective similarity: `ngram_similarity` if it already meets
    /// the producer's skip threshold of 70, else `lcs_similarity` if
    /// present, else `ngram_similarity`.
    #[must_use]
    pub fn effective_similarity(&self) -> u8 {
        if self.ngram_similarity >= 70 {
            self.ngram_similarity
        } else {
            self.lcs_similarity.unwrap_or(self.ngram_similarity)
        }
    }
}

/// A connected component of one revision's similarity graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneGroup {
    /// Lexicographically smallest member block_id; stable for a given input
    pub group_id: String,
    /// All block_ids belonging to this group
    pub members: BTreeSet<String>,
    /// Effective similarity for every member pair that meets the group
    /// threshold, keyed by the canonical unordered pair
    pub pair_similarities: BTreeMap<(String, String), u8>,
}

impl CloneGroup {
    /// Number of members.
    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Whether this group actually represents a clone (2+ members).
    #[must_use]
    pub fn is_clone(&self) -> bool {
        self.size() >= 2
    }

    /// Average effective similarity across recorded pairs, or `None` for a
    /// singleton group.
    #[must_use]
    pub fn avg_similarity(&self) -> Option<f64> {
        if self.pair_similarities.is_empty() {
            return None;
        }
        let sum: u64 = self.pair_similarities.values().map(|&s| u64::from(s)).sum();
        Some(sum as f64 / self.pair_similarities.len() as f64)
    }

    /// Minimum effective similarity across recorded pairs.
    #[must_use]
    pub fn min_similarity(&self) -> Option<u8> {
        self.pair_similarities.values().copied().min()
    }

    /// Maximum effective similarity across recorded pairs.
    #[must_use]
    pub fn max_similarity(&self) -> Option<u8> {
        self.pair_similarities.values().copied().max()
    }

    /// Density: the fraction of all possible member pairs that actually
    /// have a recorded similarity, in `[0, 1]`.
    #[must_use]
    pub fn density(&self) -> f64 {
        let n = self.size();
        if n < 2 {
            return 0.0;
        }
        let possible = (n * (n - 1)) / 2;
        self.pair_similarities.len() as f64 / possible as f64
    }
}

/// Outcome of matching one source block against the other revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodMatch {
    /// Token hashes were equal; target is an exact copy.
    Exact {
        /// Matched target block_id
        target: String,
    },
    /// Target chosen by similarity search.
    Fuzzy {
        /// Matched target block_id
        target: String,
        /// Similarity in `[similarity_threshold, 100]`
        similarity: u8,
    },
    /// No acceptable target was found.
    None,
}

impl MethodMatch {
    /// The matched target block_id, if any.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Exact { target } | Self::Fuzzy { target, .. } => Some(target),
            Self::None => None,
        }
    }

    /// Whether this is an exact match.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact { .. })
    }
}

/// Outcome of matching one source clone group against the other revision's
/// groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMatch {
    /// The best-candidate target group, if overlap cleared the threshold
    pub target_group_id: Option<String>,
    /// Number of source members whose match lands in the target group
    pub overlap_count: usize,
    /// `overlap_count / source_size`
    pub overlap_ratio: f64,
    /// Size of the source group
    pub source_size: usize,
    /// Size of the target group (0 if no target was accepted)
    pub target_size: usize,
    /// This source group is one of several that split into distinct targets
    pub split: bool,
    /// The target group is the accepted match of two or more source groups
    pub merge: bool,
}

/// Refined method lifecycle label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodStateDetail {
    /// Exact match, both sides singleton groups
    SurvivedUnchanged,
    /// Exact match, block's clone group gained members
    SurvivedCloneGained,
    /// Exact match, block's clone group lost members
    SurvivedCloneLost,
    /// Fuzzy match, both sides not in a (multi-member) clone group
    SurvivedModifiedUnchanged,
    /// Fuzzy match, at least one side is in a (multi-member) clone group
    SurvivedModifiedClone,
    /// New block, singleton in the new revision
    AddedIsolated,
    /// New block, joined a group that already had survivors
    AddedToGroup,
    /// New block, in a group composed entirely of other added blocks
    AddedNewGroup,
    /// Deleted block that was a singleton
    DeletedIsolated,
    /// Deleted block whose departure leaves its old group with no survivors
    DeletedLastMember,
    /// Deleted block that leaves its old group with other survivors
    DeletedFromGroup,
}

/// Top-level method lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodState {
    /// Present in the old revision, absent (unmatched) in the new one
    Deleted,
    /// Present in both revisions, connected by a match
    Survived,
    /// Present only in the new revision
    Added,
}

impl MethodStateDetail {
    /// The coarse [`MethodState`] this detail belongs to.
    #[must_use]
    pub fn top_level(self) -> MethodState {
        match self {
            Self::SurvivedUnchanged
            | Self::SurvivedCloneGained
            | Self::SurvivedCloneLost
            | Self::SurvivedModifiedUnchanged
            | Self::SurvivedModifiedClone => MethodState::Survived,
            Self::AddedIsolated | Self::AddedToGroup | Self::AddedNewGroup => MethodState::Added,
            Self::DeletedIsolated | Self::DeletedLastMember | Self::DeletedFromGroup => {
                MethodState::Deleted
            }
        }
    }
}

/// How a block was matched, for trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    /// Matched by exact token-hash equality
    Exact,
    /// Matched by similarity search
    Fuzzy,
    /// No match was found
    None,
}

/// Clone-group lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupState {
    /// No predecessor matched to this group
    Born,
    /// Matched a predecessor whose size did not change beyond tolerance
    Continued,
    /// Matched a predecessor, grew beyond tolerance
    Grown,
    /// Matched a predecessor, shrank beyond tolerance
    Shrunk,
    /// This source group split into two or more accepted target groups
    Split,
    /// This target group is the accepted match of two or more source groups
    Merged,
    /// No successor matched to this group
    Dissolved,
}

/// One row of the method trace output: 17 columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodTraceRow {
    /// Revision this observation belongs to
    pub revision_id: String,
    /// The block observed
    pub block_id: String,
    /// Function name at the time of observation
    pub function_name: String,
    /// File path at the time of observation
    pub file_path: String,
    /// First line, inclusive
    pub start_line: u32,
    /// Last line, inclusive
    pub end_line: u32,
    /// `end_line - start_line + 1`
    pub loc: u32,
    /// Coarse lifecycle state
    pub state: MethodState,
    /// Refined lifecycle label
    pub state_detail: MethodStateDetail,
    /// Matched block_id in the previous revision, if any
    pub matched_block_id: Option<String>,
    /// How the match was found
    pub match_type: MatchType,
    /// Similarity of a fuzzy match, if any
    pub match_similarity: Option<u8>,
    /// `clone_group_size - 1`, or 0 outside a group
    pub clone_count: usize,
    /// The clone group this block belongs to, if any (size 1 groups are
    /// tracked internally but are not clones, so they are omitted here)
    pub clone_group_id: Option<String>,
    /// Size of `clone_group_id`, if present
    pub clone_group_size: Option<usize>,
    /// Number of revisions this block's lineage has been observed in
    pub lifetime_revisions: u32,
    /// Days between the lineage's first and last observation
    pub lifetime_days: i64,
}

/// One row of the group trace output: 14 columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTraceRow {
    /// Revision this observation belongs to
    pub revision_id: String,
    /// The group observed
    pub group_id: String,
    /// Member count
    pub member_count: usize,
    /// Average effective similarity, absent for a singleton group
    pub avg_similarity: Option<f64>,
    /// Minimum effective similarity, absent for a singleton group
    pub min_similarity: Option<u8>,
    /// Maximum effective similarity, absent for a singleton group
    pub max_similarity: Option<u8>,
    /// Fraction of possible member pairs with a recorded similarity
    pub density: f64,
    /// Lifecycle state
    pub state: GroupState,
    /// Matched group_id in the other revision, if any
    pub matched_group_id: Option<String>,
    /// Member-overlap ratio with the matched group
    pub overlap_ratio: Option<f64>,
    /// Members gained relative to the matched predecessor
    pub member_added: usize,
    /// Members lost relative to the matched predecessor
    pub member_removed: usize,
    /// Number of revisions this group's lineage has been observed in
    pub lifetime_revisions: u32,
    /// Days between the lineage's first and last observation
    pub lifetime_days: i64,
}

/// One row of the membership snapshot output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipRow {
    /// Revision this snapshot belongs to
    pub revision_id: String,
    /// The group the block belongs to
    pub group_id: String,
    /// The member block
    pub block_id: String,
    /// Function name at the time of observation
    pub function_name: String,
    /// Whether the group is an actual clone (size >= 2)
    pub is_clone: bool,
}

/// A revision snapshot: an ordered id/date pair plus the
/// code blocks and clone pairs recorded at that point in history.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    /// Canonically sortable identifier (e.g. a VCS revision hash or an
    /// ISO-8601 timestamp string)
    pub revision_id: String,
    /// Calendar date associated with this revision
    pub date: NaiveDate,
    /// All code blocks present at this revision, keyed by block_id
    pub blocks: BTreeMap<String, CodeBlock>,
    /// All recorded clone pairs at this revision
    pub clone_pairs: Vec<ClonePair>,
}

impl Revision {
    /// Construct an empty revision at the given id/date.
    #[must_use]
    pub fn new(revision_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            revision_id: revision_id.into(),
            date,
            blocks: BTreeMap::new(),
            clone_pairs: Vec::new(),
        }
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for Revision {}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.revision_id.cmp(&other.revision_id)
    }
}
