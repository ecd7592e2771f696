//! Ontological refinement oracles
//!
//! Comparison code never talks to an ontology directly. It asks one question:
//!
//! ```text
//! is_ontological_child("ido:0000592", "ido:0000511") -> bool
//! ```
//!
//! i.e. "is the first term a (transitive) is-a / part-of descendant of the
//! second?". This crate defines that boundary and ships the implementations
//! the comparators are used with:
//!
//! - [`ClosureOracle`]: a materialized transitive closure (O(1) membership),
//!   either loaded as `(child, parent)` pairs or computed from direct edges.
//! - [`CachedOracle`]: per-run memoization around any other oracle.
//! - plain closures `Fn(&str, &str) -> bool`, and [`FnOracle`] for fallible ones.
//! - `HttpOracle` (feature `live`): one knowledge-graph query per pair.
//!
//! CURIEs are `prefix:local_id` strings throughout.

pub mod cache;
pub mod closure;
#[cfg(feature = "live")]
pub mod http;

pub use cache::CachedOracle;
pub use closure::ClosureOracle;
#[cfg(feature = "live")]
pub use http::{HttpOracle, HttpOracleConfig};

// ============================================================================
// Oracle boundary
// ============================================================================

/// Relation types the closure is taken over: subclass-of and part-of.
pub const REFINEMENT_RELATIONS: &[&str] = &["rdfs:subClassOf", "BFO:0000050"];

/// Answers whether `child` is an ontological descendant of `parent`.
///
/// Implementations must be pure from the caller's point of view: the same
/// pair always yields the same answer for the lifetime of one comparison.
pub trait RefinementOracle {
    fn is_ontological_child(&self, child: &str, parent: &str) -> Result<bool, OracleError>;
}

impl<F> RefinementOracle for F
where
    F: Fn(&str, &str) -> bool,
{
    fn is_ontological_child(&self, child: &str, parent: &str) -> Result<bool, OracleError> {
        Ok(self(child, parent))
    }
}

/// Adapter for oracle functions that can fail (e.g. a hand-rolled service client).
pub struct FnOracle<F>(pub F);

impl<F> RefinementOracle for FnOracle<F>
where
    F: Fn(&str, &str) -> Result<bool, OracleError>,
{
    fn is_ontological_child(&self, child: &str, parent: &str) -> Result<bool, OracleError> {
        (self.0)(child, parent)
    }
}

/// An oracle that never affirms a relation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefinement;

impl RefinementOracle for NoRefinement {
    fn is_ontological_child(&self, _child: &str, _parent: &str) -> Result<bool, OracleError> {
        Ok(false)
    }
}

// ============================================================================
// CURIEs
// ============================================================================

/// Join a namespace and local id into `prefix:local_id`.
pub fn format_curie(prefix: &str, local_id: &str) -> String {
    format!("{prefix}:{local_id}")
}

/// Split `prefix:local_id` at the first colon.
pub fn split_curie(curie: &str) -> Result<(&str, &str), OracleError> {
    match curie.split_once(':') {
        Some((prefix, local_id)) if !prefix.is_empty() && !local_id.is_empty() => {
            Ok((prefix, local_id))
        }
        _ => Err(OracleError::InvalidCurie(curie.to_string())),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("ontology oracle unavailable: {message}")]
    Unavailable { message: String },

    #[error("invalid CURIE `{0}` (expected `prefix:local_id`)")]
    InvalidCurie(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_oracles() {
        let oracle = |child: &str, parent: &str| child == "ido:1" && parent == "ido:0";
        assert!(oracle.is_ontological_child("ido:1", "ido:0").unwrap());
        assert!(!oracle.is_ontological_child("ido:0", "ido:1").unwrap());
    }

    #[test]
    fn fallible_oracle_surfaces_errors() {
        let oracle = FnOracle(|_: &str, _: &str| -> Result<bool, OracleError> {
            Err(OracleError::Unavailable {
                message: "connection refused".to_string(),
            })
        });
        let err = oracle.is_ontological_child("a:1", "a:2").unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn curie_split_and_format() {
        assert_eq!(split_curie("ido:0000514").unwrap(), ("ido", "0000514"));
        assert_eq!(format_curie("ncit", "C171133"), "ncit:C171133");
        assert!(split_curie("no_colon").is_err());
        assert!(split_curie(":missing").is_err());
    }
}
