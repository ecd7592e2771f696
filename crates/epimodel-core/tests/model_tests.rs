use std::io::Write;

use epimodel_core::{
    stratify, Concept, Config, NoRefinement, StratifyOptions, Template, TemplateModel,
    TemplateType, DEFAULT_CONFIG,
};

const SIR_JSON: &str = r#"{
  "templates": [
    {
      "type": "ControlledConversion",
      "controller": {"name": "I", "identifiers": {"ido": "0000511"}},
      "subject": {"name": "S", "identifiers": {"ido": "0000514", "ncit": "C171133"}},
      "outcome": {"name": "I", "identifiers": {"ido": "0000511"}},
      "rate_law": "beta*S*I/N",
      "name": "infection"
    },
    {
      "type": "NaturalConversion",
      "subject": {"name": "I", "identifiers": {"ido": "0000511"}},
      "outcome": {"name": "R", "identifiers": {"ido": "0000592"}},
      "rate_law": "gamma*I",
      "name": "recovery"
    }
  ],
  "parameters": {
    "beta": {"name": "beta", "value": 0.4},
    "gamma": {"name": "gamma", "value": 0.1, "units": {"expression": "1/day"}},
    "N": {"name": "N", "value": 1000.0}
  },
  "initials": {
    "S": {"concept": {"name": "S", "identifiers": {"ido": "0000514"}}, "expression": "990"},
    "I": {"concept": {"name": "I", "identifiers": {"ido": "0000511"}}, "expression": "10"}
  },
  "annotations": {"name": "SIR", "diseases": ["doid:0080600"], "model_version": "1"}
}"#;

#[test]
fn model_loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(SIR_JSON.as_bytes()).expect("write model");

    let model = TemplateModel::from_json_file(file.path()).expect("load model");
    assert_eq!(model.templates.len(), 2);
    assert_eq!(model.templates[0].template_type(), TemplateType::ControlledConversion);
    assert_eq!(model.parameters["gamma"].concept.units.as_ref().unwrap().expression, "1/day");

    let annotations = model.annotations.as_ref().unwrap();
    assert_eq!(annotations.name.as_deref(), Some("SIR"));
    assert_eq!(annotations.extra["model_version"], "1");

    let params = model.get_parameters_from_rate_law(&model.templates[0]);
    assert_eq!(params.into_iter().collect::<Vec<_>>(), vec!["N", "beta"]);
}

#[test]
fn missing_file_reports_the_path() {
    let err = TemplateModel::from_json_file("/nonexistent/model.json").unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/model.json"));
}

#[test]
fn prefix_priority_changes_concept_keys() {
    let model = TemplateModel::from_json(SIR_JSON).unwrap();
    let concepts = model.get_concepts_name_map();
    let subject = concepts["S"];
    assert_eq!(subject.get_curie(&DEFAULT_CONFIG), ("ido", "0000514"));

    let ncit = Config::default().with_prefix_priority(["ncit"]);
    assert_eq!(subject.get_curie(&ncit), ("ncit", "C171133"));
    assert_ne!(subject.get_key(&DEFAULT_CONFIG), subject.get_key(&ncit));
}

#[test]
fn stratified_templates_refine_their_source() {
    let model = TemplateModel::from_json(SIR_JSON).unwrap();
    let options = StratifyOptions::new("city", ["boston", "nyc"]);
    let stratified = stratify(&model, &options, &DEFAULT_CONFIG).unwrap();

    for source in &model.templates {
        let copies: Vec<&Template> = stratified
            .templates
            .iter()
            .filter(|t| {
                t.name
                    .as_deref()
                    .zip(source.name.as_deref())
                    .is_some_and(|(n, base)| n.starts_with(base))
            })
            .collect();
        assert_eq!(copies.len(), 2);
        for copy in copies {
            assert!(copy
                .refinement_of(source, &NoRefinement, true, &DEFAULT_CONFIG)
                .unwrap());
            assert!(!copy.is_equal_to(source, true, &DEFAULT_CONFIG).unwrap());
        }
    }

    // N is not tied to a compartment but still gets a copy per stratum.
    assert!(stratified.parameters.contains_key("N_boston"));
    assert_eq!(stratified.initials.len(), 4);
    assert_eq!(stratified.initials["I_nyc"].expression.as_str(), "10");
}

#[test]
fn stratification_without_renaming_keeps_names() {
    let model = TemplateModel::from_json(SIR_JSON).unwrap();
    let options = StratifyOptions::new("vax", ["yes", "no"])
        .modify_names(false)
        .stratify_parameters(false)
        .with_structure([("no", "yes")])
        .directed(true);
    let stratified = stratify(&model, &options, &DEFAULT_CONFIG).unwrap();

    // 2 templates * 2 strata + 3 compartments * 1 conversion
    assert_eq!(stratified.templates.len(), 7);
    assert_eq!(
        stratified.templates[0].rate_law.as_ref().unwrap().as_str(),
        "beta*S*I/N"
    );
    let names = stratified.get_concepts_name_map();
    assert_eq!(names.len(), 3);
    assert!(stratified.parameters.contains_key("beta"));
    assert!(stratified.parameters.contains_key("p_S_no_yes"));

    let vaccinated = Concept::new("S").grounded("ido", "0000514").with_context([("vax", "yes")]);
    assert!(stratified
        .get_concepts()
        .any(|c| c.is_equal_to(&vaccinated, true, &DEFAULT_CONFIG)));
}
