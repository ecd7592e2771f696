//! Materialized transitive closure of an ontology's hierarchy relations.
//!
//! Membership is a hash lookup, so this is the oracle to use when the same
//! ontology backs many comparison runs: compute (or load) the closure once and
//! every `is_ontological_child` query becomes O(1).

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::{OracleError, RefinementOracle};

/// A set of `(descendant, ancestor)` CURIE pairs.
///
/// The relation is strict: a term is never reported as its own ancestor,
/// even if the input pairs contain a cycle back to it.
#[derive(Debug, Clone, Default)]
pub struct ClosureOracle {
    ancestors_of: AHashMap<String, AHashSet<String>>,
    pair_count: usize,
}

/// Serializable form: a flat list of `[child, parent]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClosurePairs(pub Vec<(String, String)>);

impl ClosureOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already-materialized closure.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut oracle = Self::new();
        for (child, parent) in pairs {
            oracle.insert(child.into(), parent.into());
        }
        oracle
    }

    /// Compute the closure from direct child -> parent edges.
    pub fn from_direct_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut direct_parents: AHashMap<String, Vec<String>> = AHashMap::new();
        for (child, parent) in edges {
            let (child, parent) = (child.into(), parent.into());
            direct_parents.entry(parent.clone()).or_default();
            direct_parents.entry(child).or_default().push(parent);
        }

        let mut oracle = Self::new();
        for (term, parents) in &direct_parents {
            let mut seen: AHashSet<String> = AHashSet::new();
            let mut stack: Vec<String> = parents.clone();
            while let Some(parent) = stack.pop() {
                if parent == *term {
                    continue;
                }
                if seen.insert(parent.clone()) {
                    if let Some(next) = direct_parents.get(&parent) {
                        stack.extend(next.iter().cloned());
                    }
                }
            }
            for ancestor in seen {
                oracle.insert(term.clone(), ancestor);
            }
        }
        oracle
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let pairs: ClosurePairs = serde_json::from_str(json)?;
        Ok(Self::from_pairs(pairs.0))
    }

    fn insert(&mut self, child: String, parent: String) {
        if child == parent {
            return;
        }
        if self.ancestors_of.entry(child).or_default().insert(parent) {
            self.pair_count += 1;
        }
    }

    pub fn contains(&self, child: &str, parent: &str) -> bool {
        self.ancestors_of
            .get(child)
            .map(|ancestors| ancestors.contains(parent))
            .unwrap_or(false)
    }

    /// All ancestors of `child`, sorted.
    pub fn parents_of(&self, child: &str) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .ancestors_of
            .get(child)
            .map(|ancestors| ancestors.iter().map(String::as_str).collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    pub fn len(&self) -> usize {
        self.pair_count
    }

    pub fn is_empty(&self) -> bool {
        self.pair_count == 0
    }

    /// Sorted pair list, suitable for persisting and reloading via [`Self::from_json`].
    pub fn to_pairs(&self) -> ClosurePairs {
        let mut pairs: Vec<(String, String)> = self
            .ancestors_of
            .iter()
            .flat_map(|(child, ancestors)| {
                ancestors
                    .iter()
                    .map(move |parent| (child.clone(), parent.clone()))
            })
            .collect();
        pairs.sort();
        ClosurePairs(pairs)
    }
}

impl RefinementOracle for ClosureOracle {
    fn is_ontological_child(&self, child: &str, parent: &str) -> Result<bool, OracleError> {
        Ok(self.contains(child, parent))
    }
}
