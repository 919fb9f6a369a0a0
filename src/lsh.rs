//! MinHash signatures and banded LSH candidate generation.
//!
//! Seeded-hash MinHash permutations plus an LSH index that buckets
//! signatures by band hash, adapted from shingled source-text to integer
//! token sets, and from
//! `HashMap`/insertion order to `BTreeMap` so that candidate lists (and
//! therefore everything downstream of them) come out in the same order on
//! every run over the same input.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use ahash::AHasher;

use crate::core::config::LshConfig;

/// A MinHash signature over a block's unique token set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinHashSignature {
    /// One minimum hash per permutation
    pub signature: Vec<u64>,
}

impl MinHashSignature {
    /// Compute the signature of `tokens` under `num_permutations` seeded
    /// hash functions. Tokens are de-duplicated first; a MinHash signature
    /// only depends on the token *set*.
    #[must_use]
    pub fn compute(tokens: &[i64], num_permutations: usize) -> Self {
        let unique: BTreeSet<i64> = tokens.iter().copied().collect();
        let mut signature = vec![u64::MAX; num_permutations];

        for token in &unique {
            for (seed, slot) in signature.iter_mut().enumerate() {
                let hash = hash_with_seed(*token, seed as u64);
                if hash < *slot {
                    *slot = hash;
                }
            }
        }
        Self { signature }
    }

    /// Estimated Jaccard similarity between two signatures of equal length:
    /// the fraction of permutation slots that agree.
    #[must_use]
    pub fn estimated_jaccard(&self, other: &Self) -> f64 {
        if self.signature.len() != other.signature.len() || self.signature.is_empty() {
            return 0.0;
        }
        let matching = self
            .signature
            .iter()
            .zip(&other.signature)
            .filter(|(a, b)| a == b)
            .count();
        matching as f64 / self.signature.len() as f64
    }
}

fn hash_with_seed(token: i64, seed: u64) -> u64 {
    let mut hasher = AHasher::default();
    seed.hash(&mut hasher);
    token.hash(&mut hasher);
    hasher.finish()
}

fn hash_band(band: &[u64]) -> u64 {
    let mut hasher = AHasher::default();
    band.hash(&mut hasher);
    hasher.finish()
}

/// Choose an (bands, rows-per-band) split of `num_permutations` whose
/// implied LSH threshold `(1 / bands) ^ (1 / rows)` is closest to
/// `target_threshold`, preferring more bands (higher recall) on ties.
/// Only exact divisors of `num_permutations` are considered, since a band
/// must cover a whole number of signature slots.
#[must_use]
pub fn bands_for_threshold(num_permutations: usize, target_threshold: f64) -> (usize, usize) {
    let mut best = (1, num_permutations);
    let mut best_distance = f64::MAX;

    for rows in 1..=num_permutations {
        if num_permutations % rows != 0 {
            continue;
        }
        let bands = num_permutations / rows;
        let implied = (1.0 / bands as f64).powf(1.0 / rows as f64);
        let distance = (implied - target_threshold).abs();
        if distance < best_distance || (distance == best_distance && bands > best.0) {
            best_distance = distance;
            best = (bands, rows);
        }
    }
    best
}

/// An LSH index over MinHash signatures, supporting approximate nearest
/// neighbour candidate queries.
#[derive(Debug)]
pub struct LshIndex {
    num_bands: usize,
    rows_per_band: usize,
    bands: Vec<BTreeMap<u64, Vec<String>>>,
    signatures: BTreeMap<String, MinHashSignature>,
}

impl LshIndex {
    /// Build an empty index sized from `config`.
    #[must_use]
    pub fn new(config: &LshConfig) -> Self {
        let (num_bands, rows_per_band) =
            bands_for_threshold(config.num_permutations, config.jaccard_threshold);
        Self {
            num_bands,
            rows_per_band,
            bands: vec![BTreeMap::new(); num_bands],
            signatures: BTreeMap::new(),
        }
    }

    /// Insert a block's signature under `block_id`.
    pub fn insert(&mut self, block_id: String, signature: MinHashSignature) {
        for band_idx in 0..self.num_bands {
            let start = band_idx * self.rows_per_band;
            let end = (start + self.rows_per_band).min(signature.signature.len());
            if start >= signature.signature.len() {
                continue;
            }
            let band_hash = hash_band(&signature.signature[start..end]);
            self.bands[band_idx]
                .entry(band_hash)
                .or_default()
                .push(block_id.clone());
        }
        self.signatures.insert(block_id, signature);
    }

    /// Find candidates for an arbitrary signature, indexed or not (e.g. a
    /// block from the revision this index was never built over): every
    /// indexed block sharing at least one band bucket with `signature`,
    /// ranked by estimated Jaccard similarity descending, ties broken by
    /// block_id ascending for determinism. Unlike [`Self::query`], nothing
    /// is excluded from the result by id.
    #[must_use]
    pub fn query_signature(&self, signature: &MinHashSignature) -> Vec<(String, f64)> {
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        for band_idx in 0..self.num_bands {
            let start = band_idx * self.rows_per_band;
            let end = (start + self.rows_per_band).min(signature.signature.len());
            if start >= signature.signature.len() {
                continue;
            }
            let band_hash = hash_band(&signature.signature[start..end]);
            if let Some(members) = self.bands[band_idx].get(&band_hash) {
                candidates.extend(members.iter().cloned());
            }
        }

        let mut results: Vec<(String, f64)> = candidates
            .into_iter()
            .filter_map(|candidate| {
                self.signatures
                    .get(&candidate)
                    .map(|sig| (candidate, signature.estimated_jaccard(sig)))
            })
            .collect();

        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results
    }

    /// Find candidate matches for an already-indexed `block_id`: delegates
    /// to [`Self::query_signature`] using its stored signature, then
    /// excludes `block_id` itself from the result.
    #[must_use]
    pub fn query(&self, block_id: &str) -> Vec<(String, f64)> {
        let Some(signature) = self.signatures.get(block_id) else {
            return Vec::new();
        };
        self.query_signature(signature)
            .into_iter()
            .filter(|(candidate, _)| candidate != block_id)
            .collect()
    }

    /// Number of signatures stored in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether the index holds no signatures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
