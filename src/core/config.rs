//! Configuration surface for the evolution-tracking engine.
//!
//! Mirrors the layered, validated configuration style used throughout the
//! teacher's analysis pipeline: small nested structs, each with a `Default`
//! and a `validate()` returning a structured [`EvoError`] rather than
//! panicking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::errors::{EvoError, Result};

/// How aggressively to parallelise the fuzzy matching phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParallelMode {
    /// Parallelise only when the candidate-pair count clears
    /// `parallel_min_pairs`.
    Auto,
    /// Always parallelise.
    On,
    /// Never parallelise.
    Off,
}

impl Default for ParallelMode {
    fn default() -> Self {
        Self::Auto
    }
}

/// Configuration for [`crate::lsh::LshIndex`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LshConfig {
    /// Number of MinHash permutations (32-256).
    pub num_permutations: usize,
    /// Jaccard threshold the LSH banding is tuned around.
    pub jaccard_threshold: f64,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            num_permutations: 128,
            jaccard_threshold: 0.5,
        }
    }
}

impl LshConfig {
    /// Validate LSH parameters.
    pub fn validate(&self) -> Result<()> {
        if !(32..=256).contains(&self.num_permutations) {
            return Err(EvoError::invalid_config_field(
                format!(
                    "num_permutations must be in 32..=256, got {}",
                    self.num_permutations
                ),
                "lsh.num_permutations",
            ));
        }
        if !(0.0..=1.0).contains(&self.jaccard_threshold) {
            return Err(EvoError::invalid_config_field(
                format!(
                    "jaccard_threshold must be in 0.0..=1.0, got {}",
                    self.jaccard_threshold
                ),
                "lsh.jaccard_threshold",
            ));
        }
        Ok(())
    }
}

/// Configuration for [`crate::method_matcher::MethodMatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Skip candidate pairs whose token-length ratio exceeds this.
    pub length_skip_ratio: f64,
    /// Skip candidate pairs whose cheap token-set Jaccard is below this.
    pub jaccard_prefilter: f64,
    /// Use banded LCS instead of the plain dynamic-programming form.
    pub banded_lcs: bool,
    /// Restrict candidate generation to an [`crate::lsh::LshIndex`] query.
    pub use_lsh: bool,
    /// Evaluate only the top-k candidates per source when LSH is enabled.
    pub top_k: usize,
    /// Ordered, strictly decreasing thresholds for multi-pass matching.
    /// Empty means a single pass at `similarity_threshold`.
    pub progressive_thresholds: Vec<u8>,
    /// Parallelism selection strategy.
    pub parallel: ParallelMode,
    /// Candidate-pair count above which `Auto` enables parallelism.
    pub parallel_min_pairs: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            length_skip_ratio: 0.3,
            jaccard_prefilter: 0.3,
            banded_lcs: false,
            use_lsh: false,
            top_k: 20,
            progressive_thresholds: Vec::new(),
            parallel: ParallelMode::default(),
            parallel_min_pairs: 100_000,
        }
    }
}

impl MatcherConfig {
    /// Validate matcher parameters.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.length_skip_ratio) {
            return Err(EvoError::invalid_config_field(
                format!(
                    "length_skip_ratio must be in 0.0..=1.0, got {}",
                    self.length_skip_ratio
                ),
                "matcher.length_skip_ratio",
            ));
        }
        if !(0.0..=1.0).contains(&self.jaccard_prefilter) {
            return Err(EvoError::invalid_config_field(
                format!(
                    "jaccard_prefilter must be in 0.0..=1.0, got {}",
                    self.jaccard_prefilter
                ),
                "matcher.jaccard_prefilter",
            ));
        }
        if self.top_k == 0 {
            return Err(EvoError::invalid_config_field(
                "top_k must be greater than 0",
                "matcher.top_k",
            ));
        }
        for pair in self.progressive_thresholds.windows(2) {
            if pair[0] <= pair[1] {
                return Err(EvoError::invalid_config_field(
                    "progressive_thresholds must be strictly decreasing",
                    "matcher.progressive_thresholds",
                ));
            }
        }
        for threshold in &self.progressive_thresholds {
            if *threshold > 100 {
                return Err(EvoError::invalid_config_field(
                    format!("progressive threshold {threshold} exceeds 100"),
                    "matcher.progressive_thresholds",
                ));
            }
        }
        Ok(())
    }
}

/// Top-level configuration for a tracking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum similarity (0-100) to declare a fuzzy method match.
    pub similarity_threshold: u8,
    /// Minimum member-overlap ratio to accept a cross-revision group match.
    pub overlap_threshold: f64,
    /// Tolerance around unchanged group size before GROWN/SHRUNK applies.
    pub group_size_tolerance: f64,
    /// Minimum effective similarity (0-100) to union two blocks into a
    /// clone group within one revision.
    pub group_threshold: u8,
    /// Matching-phase configuration.
    pub matcher: MatcherConfig,
    /// LSH index configuration, used when `matcher.use_lsh` is set.
    pub lsh: LshConfig,
    /// Restrict the revision sequence to this inclusive date range.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Warn when a revision pair's matching rate falls below this floor.
    pub min_match_rate_floor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 70,
            overlap_threshold: 0.50,
            group_size_tolerance: 0.10,
            group_threshold: 70,
            matcher: MatcherConfig::default(),
            lsh: LshConfig::default(),
            date_range: None,
            min_match_rate_floor: 0.0,
        }
    }
}

impl EngineConfig {
    /// Apply the `optimise` convenience flag: enables LSH, banded LCS,
    /// and a standard progressive-threshold schedule in one call.
    #[must_use]
    pub fn optimise(mut self) -> Self {
        self.matcher.use_lsh = true;
        self.matcher.banded_lcs = true;
        self.matcher.progressive_thresholds = vec![90, 80, 70];
        self
    }

    /// Validate the whole configuration tree. Called before any revision
    /// pair is processed.
    pub fn validate(&self) -> Result<()> {
        if self.similarity_threshold > 100 {
            return Err(EvoError::invalid_config_field(
                format!(
                    "similarity_threshold must be 0..=100, got {}",
                    self.similarity_threshold
                ),
                "similarity_threshold",
            ));
        }
        if self.group_threshold > 100 {
            return Err(EvoError::invalid_config_field(
                format!(
                    "group_threshold must be 0..=100, got {}",
                    self.group_threshold
                ),
                "group_threshold",
            ));
        }
        if !(0.0..=1.0).contains(&self.overlap_threshold) {
            return Err(EvoError::invalid_config_field(
                format!(
                    "overlap_threshold must be 0.0..=1.0, got {}",
                    self.overlap_threshold
                ),
                "overlap_threshold",
            ));
        }
        if self.group_size_tolerance < 0.0 {
            return Err(EvoError::invalid_config_field(
                "group_size_tolerance must be non-negative",
                "group_size_tolerance",
            ));
        }
        if let Some((start, end)) = self.date_range {
            if end < start {
                return Err(EvoError::invalid_config_field(
                    format!("date_range end {end} is before start {start}"),
                    "date_range",
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.min_match_rate_floor) {
            return Err(EvoError::invalid_config_field(
                "min_match_rate_floor must be 0.0..=1.0",
                "min_match_rate_floor",
            ));
        }
        self.matcher.validate()?;
        self.lsh.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn optimise_sets_expected_fields() {
        let config = EngineConfig::default().optimise();
        assert!(config.matcher.use_lsh);
        assert!(config.matcher.banded_lcs);
        assert_eq!(config.matcher.progressive_thresholds, vec![90, 80, 70]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_threshold_above_100() {
        let mut config = EngineConfig::default();
        config.similarity_threshold = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_date_range() {
        let mut config = EngineConfig::default();
        config.date_range = Some((
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_decreasing_progressive_thresholds() {
        let mut config = EngineConfig::default();
        config.matcher.progressive_thresholds = vec![70, 80];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_overlap_threshold_out_of_range() {
        let mut config = EngineConfig::default();
        config.overlap_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
