//! Union-find over opaque string keys.
//!
//! Supports path compression on `find` and union-by-rank, giving amortised
//! near-linear cost over the whole sequence of operations. There are no
//! error conditions: unknown keys are auto-inserted as singletons.

use std::collections::BTreeMap;

/// A disjoint-set (union-find) structure keyed by string identifiers.
#[derive(Debug, Clone, Default)]
pub struct DisjointSet {
    parent: BTreeMap<String, String>,
    rank: BTreeMap<String, u32>,
    /// Insertion order, preserved so `groups()` can report members
    /// deterministically even though `parent`/`rank` are keyed maps.
    insertion_order: Vec<String>,
}

impl DisjointSet {
    /// Create an empty disjoint set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `x` is present as (at least) a singleton, without changing its
    /// group if it already exists.
    pub fn make_set(&mut self, x: &str) {
        if !self.parent.contains_key(x) {
            self.parent.insert(x.to_string(), x.to_string());
            self.rank.insert(x.to_string(), 0);
            self.insertion_order.push(x.to_string());
        }
    }

    /// Find the representative (root) of `x`'s group, auto-inserting `x` as
    /// a new singleton if it has not been seen before. Applies path
    /// compression.
    pub fn find(&mut self, x: &str) -> String {
        self.make_set(x);

        // Collect the path to the root, then repoint every node on it
        // directly at the root (full path compression).
        let mut path = Vec::new();
        let mut current = x.to_string();
        loop {
            let parent = self.parent.get(&current).cloned().unwrap_or_else(|| current.clone());
            if parent == current {
                break;
            }
            path.push(current);
            current = parent;
        }
        let root = current;
        for node in path {
            self.parent.insert(node, root.clone());
        }
        root
    }

    /// Merge the groups containing `x` and `y`, by rank. No-op if they are
    /// already in the same group.
    pub fn union(&mut self, x: &str, y: &str) {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x == root_y {
            return;
        }

        let rank_x = *self.rank.get(&root_x).unwrap_or(&0);
        let rank_y = *self.rank.get(&root_y).unwrap_or(&0);

        match rank_x.cmp(&rank_y) {
            std::cmp::Ordering::Less => {
                self.parent.insert(root_x, root_y);
            }
            std::cmp::Ordering::Greater => {
                self.parent.insert(root_y, root_x);
            }
            std::cmp::Ordering::Equal => {
                self.parent.insert(root_y.clone(), root_x.clone());
                self.rank.insert(root_x, rank_x + 1);
            }
        }
    }

    /// Whether `x` and `y` are in the same group. Auto-inserts both.
    pub fn connected(&mut self, x: &str, y: &str) -> bool {
        self.find(x) == self.find(y)
    }

    /// All groups as `{root -> members}`, with members listed in the order
    /// they were first inserted.
    #[must_use]
    pub fn groups(&self) -> BTreeMap<String, Vec<String>> {
        // Resolve roots without mutating self, so this can stay `&self`:
        // walk each chain to its end (compression may not be complete, but
        // parent chains are always finite and acyclic by construction).
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in &self.insertion_order {
            let mut root = key.clone();
            loop {
                let parent = self.parent.get(&root).cloned().unwrap_or_else(|| root.clone());
                if parent == root {
                    break;
                }
                root = parent;
            }
            groups.entry(root).or_default().push(key.clone());
        }
        groups
    }

    /// Total number of elements inserted.
    #[must_use]
    pub fn size(&self) -> usize {
        self.parent.len()
    }

    /// Number of distinct groups.
    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.groups().len()
    }
}
