//! Integration tests for the comparison pipeline
//!
//! These tests verify end-to-end behavior across crates:
//! - JSON template models → multi-model comparison → similarity scores
//! - Stratification → comparison against the source model
//! - Ontology closure → refinement edges → pairwise delta
//!
//! Run with: cargo test --test integration_tests

use std::sync::Once;

use approx::assert_relative_eq;
use epimodel_compare::{
    CompareError, DataNode, EdgeRole, ModelComparisonGraphdata, TemplateModelComparison,
    TemplateModelDelta,
};
use epimodel_core::{
    stratify, Concept, StratifyOptions, Template, TemplateModel, DEFAULT_CONFIG,
};
use epimodel_ontology::{ClosureOracle, NoRefinement};
use tempfile::tempdir;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .try_init();
    });
}

fn never(_: &str, _: &str) -> bool {
    false
}

fn sir_json() -> &'static str {
    r#"{
      "templates": [
        {
          "type": "ControlledConversion",
          "controller": {"name": "I", "identifiers": {"ido": "0000511"}},
          "subject": {"name": "S", "identifiers": {"ido": "0000514"}},
          "outcome": {"name": "I", "identifiers": {"ido": "0000511"}},
          "rate_law": "beta*S*I"
        },
        {
          "type": "NaturalConversion",
          "subject": {"name": "I", "identifiers": {"ido": "0000511"}},
          "outcome": {"name": "R", "identifiers": {"ido": "0000592"}},
          "rate_law": "gamma*I"
        }
      ],
      "parameters": {"beta": {"name": "beta", "value": 0.4}, "gamma": {"name": "gamma", "value": 0.1}}
    }"#
}

// ============================================================================
// Similarity scenarios
// ============================================================================

#[test]
fn test_identical_ungrounded_models_score_one() {
    init_tracing();
    let model_a = TemplateModel::new(vec![Template::natural_conversion(
        Concept::new("S"),
        Concept::new("I"),
    )]);
    let model_b = model_a.clone();

    let comparison =
        TemplateModelComparison::new(&[model_a, model_b], &never, &DEFAULT_CONFIG).unwrap();
    let scores = comparison.model_comparison.get_similarity_scores().unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].models, (0, 1));
    assert_relative_eq!(scores[0].score, 1.0);
}

#[test]
fn test_context_refinements_score_half() {
    init_tracing();
    let s = Concept::new("S");
    let i = Concept::new("I");
    let model_a = TemplateModel::new(vec![Template::controlled_conversion(
        i.clone(),
        s.clone(),
        i.clone(),
    )]);
    let model_b = TemplateModel::new(vec![Template::controlled_conversion(
        i.clone(),
        s.clone(),
        i.clone(),
    )
    .with_context([("city", "boston")])]);

    let data = TemplateModelComparison::new(&[model_a, model_b], &never, &DEFAULT_CONFIG)
        .unwrap()
        .into_graphdata();
    let score = data.get_similarity_score(0, 1).unwrap();
    assert!(score > 0.0 && score < 1.0);
    assert_relative_eq!(score, 0.5);

    // Every inter-model edge points from the boston model to the plain one.
    assert!(data
        .inter_model_edges
        .iter()
        .all(|e| e.role() == EdgeRole::RefinementOf && e.source().0 == 1 && e.target().0 == 0));
}

#[test]
fn test_single_model_is_rejected() {
    let model = TemplateModel::from_json(sir_json()).unwrap();
    let err = TemplateModelComparison::new(&[model], &never, &DEFAULT_CONFIG).unwrap_err();
    assert!(matches!(err, CompareError::InsufficientModels { given: 1 }));
}

#[test]
fn test_mismatched_types_never_relate() {
    let natural = Template::natural_conversion(Concept::new("S"), Concept::new("I"));
    let controlled =
        Template::controlled_conversion(Concept::new("I"), Concept::new("S"), Concept::new("I"));
    assert!(!natural
        .refinement_of(&controlled, &never, true, &DEFAULT_CONFIG)
        .unwrap());
    assert!(!controlled
        .refinement_of(&natural, &never, true, &DEFAULT_CONFIG)
        .unwrap());
}

// ============================================================================
// Structure of the comparison graph
// ============================================================================

#[test]
fn test_stratified_model_compared_to_source() {
    init_tracing();
    let sir = TemplateModel::from_json(sir_json()).unwrap();
    let options = StratifyOptions::new("city", ["boston", "nyc"])
        .with_structure(Vec::<(String, String)>::new());
    let stratified = stratify(&sir, &options, &DEFAULT_CONFIG).unwrap();

    let data = TemplateModelComparison::new(&[sir, stratified], &never, &DEFAULT_CONFIG)
        .unwrap()
        .into_graphdata();

    // Stratified templates refine the source templates, never equal them.
    let template_edges: Vec<_> = data
        .inter_model_edges
        .iter()
        .filter(|e| matches!(data.get_node(e.source()), Some(DataNode::Template(_))))
        .collect();
    assert_eq!(template_edges.len(), 4);
    assert!(template_edges
        .iter()
        .all(|e| e.role() == EdgeRole::RefinementOf && e.source().0 == 1));

    // 6 stratified concepts, each refining its source concept: 6 * 0.5 / 6
    assert_relative_eq!(data.get_similarity_score(0, 1).unwrap(), 0.5);
    assert!(data
        .inter_model_edges
        .iter()
        .all(|e| e.source().0 != e.target().0));
}

#[test]
fn test_comparison_is_deterministic_and_round_trips() {
    init_tracing();
    let sir = TemplateModel::from_json(sir_json()).unwrap();
    let options = StratifyOptions::new("age", ["young", "old"]);
    let stratified = stratify(&sir, &options, &DEFAULT_CONFIG).unwrap();
    let models = vec![sir, stratified.clone(), stratified];

    let first = TemplateModelComparison::new(&models, &never, &DEFAULT_CONFIG)
        .unwrap()
        .into_graphdata();
    let second = TemplateModelComparison::new(&models, &never, &DEFAULT_CONFIG)
        .unwrap()
        .into_graphdata();
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());

    let dir = tempdir().unwrap();
    let path = dir.path().join("comparison.json");
    std::fs::write(&path, first.to_json().unwrap()).unwrap();
    let restored = ModelComparisonGraphdata::from_json_file(&path).unwrap();
    assert_eq!(restored, first);

    let scores = restored.get_similarity_scores().unwrap();
    assert_eq!(
        scores.iter().map(|s| s.models).collect::<Vec<_>>(),
        vec![(0, 1), (0, 2), (1, 2)]
    );
    assert_relative_eq!(scores[2].score, 1.0);
    for score in &scores {
        assert!((0.0..=1.0).contains(&score.score));
    }
}

// ============================================================================
// Ontology-backed refinement
// ============================================================================

#[test]
fn test_closure_oracle_drives_refinement_edges() {
    init_tracing();
    // infected_symptomatic is-a infected
    let oracle = ClosureOracle::from_direct_edges([("ido:0000573", "ido:0000511")]);
    let sir = TemplateModel::from_json(sir_json()).unwrap();
    let symptomatic = Concept::new("Is").grounded("ido", "0000573");
    let refined = TemplateModel::new(vec![Template::natural_conversion(
        symptomatic,
        Concept::new("R").grounded("ido", "0000592"),
    )]);

    let data = TemplateModelComparison::new(&[sir.clone(), refined.clone()], &oracle, &DEFAULT_CONFIG)
        .unwrap()
        .into_graphdata();
    let recovery_refinement = data.inter_model_edges.iter().find(|e| {
        e.role() == EdgeRole::RefinementOf
            && matches!(data.get_node(e.source()), Some(DataNode::Template(_)))
    });
    let edge = recovery_refinement.unwrap();
    assert_eq!(edge.source().0, 1);
    assert_eq!(edge.target(), (0, 1));

    let delta = TemplateModelDelta::new(&sir, &refined, &oracle, "sir", "refined", &DEFAULT_CONFIG)
        .unwrap();
    let concept_refinements: Vec<_> = delta
        .edges_with_role(EdgeRole::RefinementOf)
        .into_iter()
        .filter(|(from, _)| from.as_concept().is_some())
        .collect();
    assert_eq!(concept_refinements.len(), 1);
    assert_eq!(concept_refinements[0].0.as_concept().unwrap().name, "Is");
    assert_eq!(concept_refinements[0].1.as_concept().unwrap().name, "I");
    // R is shared verbatim between the two models.
    assert!(delta.find_concept_nodes("R")[0].is_merged());
}

#[test]
fn test_no_oracle_means_no_ontological_refinement() {
    let sir = TemplateModel::from_json(sir_json()).unwrap();
    let refined = TemplateModel::new(vec![Template::natural_conversion(
        Concept::new("Is").grounded("ido", "0000573"),
        Concept::new("R").grounded("ido", "0000592"),
    )]);
    let data = TemplateModelComparison::new(&[sir, refined], &NoRefinement, &DEFAULT_CONFIG)
        .unwrap()
        .into_graphdata();
    assert!(data
        .inter_model_edges
        .iter()
        .all(|e| e.role() == EdgeRole::IsEqual));
}
