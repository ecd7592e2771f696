//! Concepts: named, optionally grounded, optionally contextualized entities.
//!
//! A concept is a value object. `with_context` returns a new concept; nothing
//! in this crate mutates a concept once it is shared.
//!
//! Two predicates drive model comparison:
//!
//! - [`Concept::is_equal_to`]: same grounding (when both sides are grounded)
//!   and, optionally, the exact same context.
//! - [`Concept::refinement_of`]: strictly more specific, either ontologically
//!   (the oracle affirms child -> parent between two groundings) or
//!   contextually (same grounding, more specific context).

use std::collections::BTreeMap;

use epimodel_ontology::{format_curie, OracleError, RefinementOracle};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Units are carried verbatim; no dimensional algebra is performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ontology namespace -> local id
    #[serde(default)]
    pub identifiers: BTreeMap<String, String>,
    /// Free-form modifiers (location, vaccination status, ...)
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<Unit>,
}

/// Deterministic identity of a concept: grounding plus sorted context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConceptKey {
    pub curie: (String, String),
    pub context: Vec<(String, String)>,
}

impl Concept {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            identifiers: BTreeMap::new(),
            context: BTreeMap::new(),
            units: None,
        }
    }

    /// Builder-style grounding; used when constructing concepts by hand.
    pub fn grounded(mut self, prefix: impl Into<String>, local_id: impl Into<String>) -> Self {
        self.identifiers.insert(prefix.into(), local_id.into());
        self
    }

    pub fn with_units(mut self, expression: impl Into<String>) -> Self {
        self.units = Some(Unit {
            expression: expression.into(),
        });
        self
    }

    /// A copy of this concept with `context` merged over the existing context.
    /// New keys win on conflict.
    pub fn with_context<I, K, V>(&self, context: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut concept = self.clone();
        for (key, value) in context {
            concept.context.insert(key.into(), value.into());
        }
        concept
    }

    /// A copy of this concept under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let mut concept = self.clone();
        concept.name = name.into();
        concept
    }

    pub fn is_grounded(&self) -> bool {
        !self.identifiers.is_empty()
    }

    /// The single `(namespace, id)` grounding used for identity.
    ///
    /// The first namespace in `config.prefix_priority` present in
    /// `identifiers` wins, then the lexicographically smallest namespace.
    /// Ungrounded concepts fall back to `("", name)`.
    pub fn get_curie<'a>(&'a self, config: &Config) -> (&'a str, &'a str) {
        for prefix in &config.prefix_priority {
            if let Some((ns, id)) = self.identifiers.get_key_value(prefix.as_str()) {
                return (ns.as_str(), id.as_str());
            }
        }
        match self.identifiers.iter().next() {
            Some((ns, id)) => (ns.as_str(), id.as_str()),
            None => ("", self.name.as_str()),
        }
    }

    /// `prefix:id` for grounded concepts.
    pub fn get_curie_str(&self, config: &Config) -> Option<String> {
        if !self.is_grounded() {
            return None;
        }
        let (prefix, id) = self.get_curie(config);
        Some(format_curie(prefix, id))
    }

    pub fn get_key(&self, config: &Config) -> ConceptKey {
        let (prefix, id) = self.get_curie(config);
        ConceptKey {
            curie: (prefix.to_string(), id.to_string()),
            context: self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Whether the groundings of two concepts identify the same entity.
    ///
    /// Grounding is authoritative only when both sides have it; otherwise the
    /// answer depends on `config.match_ungrounded_by_name`.
    pub fn grounding_matches(&self, other: &Concept, config: &Config) -> bool {
        if (self.is_grounded() && other.is_grounded()) || config.match_ungrounded_by_name {
            self.get_curie(config) == other.get_curie(config)
        } else {
            true
        }
    }

    pub fn is_equal_to(&self, other: &Concept, with_context: bool, config: &Config) -> bool {
        // BTreeMap equality covers both the key set and every value.
        if with_context && self.context != other.context {
            return false;
        }
        self.grounding_matches(other, config)
    }

    /// Whether `self` is strictly more specific than `other`.
    ///
    /// With matching groundings only context can make a concept more specific,
    /// so the result is the context-refinement predicate (and `false` when
    /// `with_context` is off). With two different groundings the oracle
    /// decides, and with `with_context` the context must refine as well.
    pub fn refinement_of<O>(
        &self,
        other: &Concept,
        oracle: &O,
        with_context: bool,
        config: &Config,
    ) -> Result<bool, OracleError>
    where
        O: RefinementOracle + ?Sized,
    {
        let contextual_refinement =
            with_context && assert_concept_context_refinement(self, other);

        let both_grounded = self.is_grounded() && other.is_grounded();
        if !both_grounded || self.get_curie(config) == other.get_curie(config) {
            return Ok(self.grounding_matches(other, config) && contextual_refinement);
        }

        let (child_prefix, child_id) = self.get_curie(config);
        let (parent_prefix, parent_id) = other.get_curie(config);
        let ontological_refinement = oracle.is_ontological_child(
            &format_curie(child_prefix, child_id),
            &format_curie(parent_prefix, parent_id),
        )?;

        Ok(ontological_refinement && (!with_context || contextual_refinement))
    }
}

/// Whether `refined`'s context is more specific than `other`'s.
///
/// - both empty: `true` (undecided; callers check equality first)
/// - only `refined` has context: `true`
/// - only `other` has context: `false`
/// - both have context: `false` when `refined`'s keys are a subset of
///   `other`'s; otherwise every entry of `other` must appear in `refined`
///   with the same value.
pub fn assert_concept_context_refinement(refined: &Concept, other: &Concept) -> bool {
    match (refined.context.is_empty(), other.context.is_empty()) {
        (true, true) => true,
        (false, true) => true,
        (true, false) => false,
        (false, false) => {
            if refined
                .context
                .keys()
                .all(|key| other.context.contains_key(key))
            {
                return false;
            }
            other
                .context
                .iter()
                .all(|(key, value)| refined.context.get(key) == Some(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CONFIG;

    fn never(_: &str, _: &str) -> bool {
        false
    }

    #[test]
    fn curie_follows_prefix_priority() {
        let concept = Concept::new("S")
            .grounded("ncit", "C171133")
            .grounded("ido", "0000514");
        assert_eq!(concept.get_curie(&DEFAULT_CONFIG), ("ido", "0000514"));

        let ncit_first = Config::default().with_prefix_priority(["ncit"]);
        assert_eq!(concept.get_curie(&ncit_first), ("ncit", "C171133"));

        let unlisted = Config::default().with_prefix_priority(["vo"]);
        assert_eq!(concept.get_curie(&unlisted), ("ido", "0000514"));
    }

    #[test]
    fn ungrounded_curie_falls_back_to_name() {
        let concept = Concept::new("susceptible");
        assert_eq!(concept.get_curie(&DEFAULT_CONFIG), ("", "susceptible"));
        assert_eq!(concept.get_curie_str(&DEFAULT_CONFIG), None);
    }

    #[test]
    fn key_is_independent_of_context_insertion_order() {
        let a = Concept::new("S").with_context([("city", "boston"), ("age", "young")]);
        let b = Concept::new("S").with_context([("age", "young"), ("city", "boston")]);
        assert_eq!(a.get_key(&DEFAULT_CONFIG), b.get_key(&DEFAULT_CONFIG));
    }

    #[test]
    fn with_context_returns_new_concept_and_new_keys_win() {
        let base = Concept::new("S").with_context([("city", "boston")]);
        let moved = base.with_context([("city", "nyc"), ("age", "old")]);
        assert_eq!(base.context.get("city").map(String::as_str), Some("boston"));
        assert_eq!(moved.context.get("city").map(String::as_str), Some("nyc"));
        assert_eq!(moved.context.len(), 2);
    }

    #[test]
    fn grounded_equality_ignores_names() {
        let a = Concept::new("S").grounded("ido", "0000514");
        let b = Concept::new("susceptible").grounded("ido", "0000514");
        let c = Concept::new("S").grounded("ido", "0000511");
        assert!(a.is_equal_to(&b, true, &DEFAULT_CONFIG));
        assert!(!a.is_equal_to(&c, true, &DEFAULT_CONFIG));
    }

    #[test]
    fn context_matters_only_with_context() {
        let a = Concept::new("S");
        let b = a.with_context([("city", "boston")]);
        assert!(a.is_equal_to(&b, false, &DEFAULT_CONFIG));
        assert!(!a.is_equal_to(&b, true, &DEFAULT_CONFIG));
    }

    #[test]
    fn ungrounded_name_matching_is_configurable() {
        let a = Concept::new("S");
        let b = Concept::new("I");
        assert!(a.is_equal_to(&b, true, &DEFAULT_CONFIG));

        let strict = Config::default().with_name_matching(true);
        assert!(!a.is_equal_to(&b, true, &strict));
        assert!(a.is_equal_to(&a.clone(), true, &strict));
    }

    #[test]
    fn ontological_refinement_uses_oracle() {
        let child = Concept::new("infected_symptomatic").grounded("ido", "0000573");
        let parent = Concept::new("infected").grounded("ido", "0000511");
        let oracle = |c: &str, p: &str| c == "ido:0000573" && p == "ido:0000511";

        assert!(child
            .refinement_of(&parent, &oracle, false, &DEFAULT_CONFIG)
            .unwrap());
        assert!(!parent
            .refinement_of(&child, &oracle, false, &DEFAULT_CONFIG)
            .unwrap());
    }

    #[test]
    fn ontological_refinement_with_context_requires_context_refinement() {
        let child = Concept::new("I2")
            .grounded("ido", "0000573")
            .with_context([("city", "boston")]);
        let parent = Concept::new("I")
            .grounded("ido", "0000511")
            .with_context([("city", "nyc")]);
        let oracle = |_: &str, _: &str| true;
        assert!(!child
            .refinement_of(&parent, &oracle, true, &DEFAULT_CONFIG)
            .unwrap());
        assert!(child
            .refinement_of(&parent, &oracle, false, &DEFAULT_CONFIG)
            .unwrap());
    }

    #[test]
    fn added_context_is_a_refinement() {
        let base = Concept::new("S").grounded("ido", "0000514");
        let refined = base.with_context([("city", "boston")]);
        assert!(refined
            .refinement_of(&base, &never, true, &DEFAULT_CONFIG)
            .unwrap());
        assert!(!base
            .refinement_of(&refined, &never, true, &DEFAULT_CONFIG)
            .unwrap());
        // Context alone is not an ontological refinement.
        assert!(!refined
            .refinement_of(&base, &never, false, &DEFAULT_CONFIG)
            .unwrap());
    }

    #[test]
    fn grounded_against_ungrounded_never_asks_oracle() {
        let grounded = Concept::new("S")
            .grounded("ido", "0000514")
            .with_context([("city", "boston")]);
        let ungrounded = Concept::new("S");
        let oracle = |_: &str, _: &str| -> bool { panic!("oracle must not be consulted") };
        assert!(grounded
            .refinement_of(&ungrounded, &oracle, true, &DEFAULT_CONFIG)
            .unwrap());
    }

    #[test]
    fn context_refinement_table() {
        let empty = Concept::new("S");
        let city = empty.with_context([("city", "boston")]);
        let city_age = empty.with_context([("city", "boston"), ("age", "young")]);
        let other_city_age = empty.with_context([("city", "nyc"), ("age", "young")]);
        let vax = empty.with_context([("vax", "yes")]);

        assert!(assert_concept_context_refinement(&empty, &empty));
        assert!(assert_concept_context_refinement(&city, &empty));
        assert!(!assert_concept_context_refinement(&empty, &city));
        assert!(!assert_concept_context_refinement(&city, &city));
        assert!(!assert_concept_context_refinement(&city, &city_age));
        assert!(assert_concept_context_refinement(&city_age, &city));
        assert!(!assert_concept_context_refinement(&other_city_age, &city));
        assert!(!assert_concept_context_refinement(&city_age, &vax));
    }

    #[test]
    fn oracle_errors_propagate() {
        use epimodel_ontology::FnOracle;

        let a = Concept::new("a").grounded("ido", "1");
        let b = Concept::new("b").grounded("ido", "2");
        let down = FnOracle(|_: &str, _: &str| -> Result<bool, OracleError> {
            Err(OracleError::Unavailable {
                message: "down".to_string(),
            })
        });
        assert!(a.refinement_of(&b, &down, false, &DEFAULT_CONFIG).is_err());
    }
}
