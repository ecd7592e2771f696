//! Per-run memoization of oracle answers.
//!
//! All-pairs comparison asks about the same `(child, parent)` pair many times
//! (one concept shows up under several templates and roles). A `CachedOracle`
//! lives for one comparison run and forwards each distinct pair at most once.

use std::cell::{Cell, RefCell};

use ahash::AHashMap;

use crate::{OracleError, RefinementOracle};

pub struct CachedOracle<'a, O: ?Sized> {
    inner: &'a O,
    answers: RefCell<AHashMap<(String, String), bool>>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl<'a, O> CachedOracle<'a, O>
where
    O: RefinementOracle + ?Sized,
{
    pub fn new(inner: &'a O) -> Self {
        Self {
            inner,
            answers: RefCell::new(AHashMap::new()),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    /// Number of queries answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    /// Number of queries forwarded to the wrapped oracle.
    pub fn misses(&self) -> usize {
        self.misses.get()
    }
}

impl<O> RefinementOracle for CachedOracle<'_, O>
where
    O: RefinementOracle + ?Sized,
{
    fn is_ontological_child(&self, child: &str, parent: &str) -> Result<bool, OracleError> {
        let key = (child.to_string(), parent.to_string());
        if let Some(answer) = self.answers.borrow().get(&key) {
            self.hits.set(self.hits.get() + 1);
            return Ok(*answer);
        }

        self.misses.set(self.misses.get() + 1);
        tracing::trace!(child, parent, "ontology oracle cache miss");
        // Errors are surfaced, not memoized.
        let answer = self.inner.is_ontological_child(child, parent)?;
        self.answers.borrow_mut().insert(key, answer);
        Ok(answer)
    }
}
