//! Stratification: split every compartment along one context dimension.
//!
//! Stratifying an SIR model by `city = {boston, nyc}` yields a model whose
//! concepts carry `{"city": ...}` context, one copy of every template per
//! stratum, and conversions between the strata of each compartment. Every
//! stratified template is a contextual refinement of the template it was
//! derived from, which is what makes stratified models comparable to their
//! source model.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::concept::Concept;
use crate::config::Config;
use crate::error::ModelError;
use crate::expr::SymbolicExpr;
use crate::model::{Initial, Parameter, TemplateModel};
use crate::template::{Role, Template};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StratifyOptions {
    /// Context key to stratify along (e.g. `city`)
    pub key: String,
    /// Context values, one per stratum
    pub strata: Vec<String>,
    /// Allowed conversions between strata; `None` means every pair
    pub structure: Option<Vec<(String, String)>>,
    /// Only add conversions in the listed direction
    pub directed: bool,
    /// Let controllers range over every stratum independently
    pub cartesian_control: bool,
    /// Suffix concept names with their stratum (`S` -> `S_boston`)
    pub modify_names: bool,
    /// Give every stratum its own copy of rate-law parameters
    pub stratify_parameters: bool,
    /// Concept names left out of stratification
    pub concepts_to_preserve: BTreeSet<String>,
}

impl Default for StratifyOptions {
    fn default() -> Self {
        Self {
            key: String::new(),
            strata: Vec::new(),
            structure: None,
            directed: false,
            cartesian_control: false,
            modify_names: true,
            stratify_parameters: true,
            concepts_to_preserve: BTreeSet::new(),
        }
    }
}

impl StratifyOptions {
    pub fn new<I, S>(key: impl Into<String>, strata: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            strata: strata.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_structure<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        self.structure = Some(
            pairs
                .into_iter()
                .map(|(a, b)| (a.into(), b.into()))
                .collect(),
        );
        self
    }

    pub fn directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    pub fn cartesian_control(mut self, enabled: bool) -> Self {
        self.cartesian_control = enabled;
        self
    }

    pub fn modify_names(mut self, enabled: bool) -> Self {
        self.modify_names = enabled;
        self
    }

    pub fn stratify_parameters(mut self, enabled: bool) -> Self {
        self.stratify_parameters = enabled;
        self
    }

    pub fn preserve<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.concepts_to_preserve
            .extend(names.into_iter().map(Into::into));
        self
    }

    fn conversion_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = match &self.structure {
            Some(pairs) => pairs.clone(),
            None => {
                let mut pairs = Vec::new();
                for (i, a) in self.strata.iter().enumerate() {
                    for b in &self.strata[i + 1..] {
                        pairs.push((a.clone(), b.clone()));
                    }
                }
                pairs
            }
        };
        if !self.directed {
            let reversed: Vec<(String, String)> =
                pairs.iter().map(|(a, b)| (b.clone(), a.clone())).collect();
            for pair in reversed {
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
        pairs
    }
}

fn stratified_concept(concept: &Concept, key: &str, stratum: &str, modify_names: bool) -> Concept {
    let out = concept.with_context([(key, stratum)]);
    if modify_names {
        out.renamed(format!("{}_{}", concept.name, stratum))
    } else {
        out
    }
}

/// Every assignment of `strata` to `slots` positions, in lexicographic order.
fn strata_product(strata: &[String], slots: usize) -> Vec<Vec<&str>> {
    let mut combos: Vec<Vec<&str>> = vec![Vec::new()];
    for _ in 0..slots {
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                strata.iter().map(move |s| {
                    let mut next = prefix.clone();
                    next.push(s.as_str());
                    next
                })
            })
            .collect();
    }
    combos
}

/// Stratify `model` along `options.key`. The input model is not modified.
///
/// Fails with [`ModelError::EmptyStrata`] when `options.strata` is empty,
/// since every non-preserved template would otherwise vanish.
pub fn stratify(
    model: &TemplateModel,
    options: &StratifyOptions,
    config: &Config,
) -> Result<TemplateModel, ModelError> {
    if options.strata.is_empty() {
        return Err(ModelError::EmptyStrata {
            key: options.key.clone(),
        });
    }
    let preserved = &options.concepts_to_preserve;
    let known: BTreeSet<&str> = model.get_concepts().map(|c| c.name.as_str()).collect();
    for name in preserved {
        if !known.contains(name.as_str()) {
            tracing::warn!(concept = %name, "concept to preserve is not part of the model");
        }
    }

    let mut templates: Vec<Template> = Vec::new();
    let mut parameters: IndexMap<String, Parameter> = model.parameters.clone();
    let mut stratified_params: BTreeSet<String> = BTreeSet::new();

    for template in &model.templates {
        if template
            .get_concepts()
            .iter()
            .all(|c| preserved.contains(&c.name))
        {
            templates.push(template.clone());
            continue;
        }

        let controller_slots = template.get_controllers().len();
        let rate_params = if options.stratify_parameters {
            model.get_parameters_from_rate_law(template)
        } else {
            BTreeSet::new()
        };

        for stratum in &options.strata {
            let assignments: Vec<Vec<&str>> = if options.cartesian_control && controller_slots > 0 {
                strata_product(&options.strata, controller_slots)
            } else {
                vec![vec![stratum.as_str(); controller_slots]]
            };

            for controller_strata in assignments {
                let mut slot = 0;
                let mut renames: BTreeMap<String, String> = BTreeMap::new();
                let mut controller_renames: BTreeMap<String, String> = BTreeMap::new();

                let kind = template.kind.map_concepts(|role, concept| {
                    let assigned = match role {
                        Role::Controller | Role::Controllers => {
                            slot += 1;
                            controller_strata[slot - 1]
                        }
                        Role::Subject | Role::Outcome => stratum.as_str(),
                    };
                    if preserved.contains(&concept.name) {
                        return concept.clone();
                    }
                    let out =
                        stratified_concept(concept, &options.key, assigned, options.modify_names);
                    let target = match role {
                        Role::Controller | Role::Controllers => &mut controller_renames,
                        Role::Subject | Role::Outcome => &mut renames,
                    };
                    target
                        .entry(concept.name.clone())
                        .or_insert_with(|| out.name.clone());
                    out
                });
                // Mass-action terms name the controller, so controller renames win.
                renames.extend(controller_renames);

                let mut suffix = vec![stratum.as_str()];
                if options.cartesian_control {
                    suffix.extend(controller_strata.iter().copied());
                }
                let suffix = suffix.join("_");

                for param in &rate_params {
                    let new_name = format!("{param}_{suffix}");
                    if let Some(original) = model.parameters.get(param) {
                        let mut copy = original.clone();
                        copy.concept.name = new_name.clone();
                        parameters.insert(new_name.clone(), copy);
                    }
                    renames.insert(param.clone(), new_name);
                    stratified_params.insert(param.clone());
                }

                templates.push(Template {
                    kind,
                    rate_law: template.rate_law.as_ref().map(|r| r.substitute(&renames)),
                    name: template.name.as_ref().map(|n| format!("{n}_{suffix}")),
                    display_name: template.display_name.clone(),
                    provenance: template.provenance.clone(),
                });
            }
        }
    }

    // Conversions between strata, one set per distinct stratified concept.
    let pairs = options.conversion_pairs();
    let concepts: Vec<&Concept> = model
        .get_concepts_map(config)
        .into_values()
        .filter(|c| c.context.get(&options.key).is_none())
        .collect();
    let mut seen_names: BTreeSet<&str> = BTreeSet::new();
    for concept in concepts {
        if preserved.contains(&concept.name) || !seen_names.insert(concept.name.as_str()) {
            continue;
        }
        for (from, to) in &pairs {
            let subject = stratified_concept(concept, &options.key, from, options.modify_names);
            let outcome = stratified_concept(concept, &options.key, to, options.modify_names);
            let param = format!("p_{}_{}_{}", concept.name, from, to);
            let rate_law = SymbolicExpr::new(format!("{param}*{}", subject.name));
            templates.push(
                Template::natural_conversion(subject, outcome)
                    .with_rate_law(rate_law)
                    .with_name(format!("{}_{}_to_{}", concept.name, from, to)),
            );
            parameters.insert(param.clone(), Parameter::new(param, None));
        }
    }

    // Drop originals that were replaced by per-stratum copies and are no
    // longer mentioned anywhere.
    let still_used = |name: &str| {
        templates
            .iter()
            .filter_map(|t| t.rate_law.as_ref())
            .any(|r| r.mentions(name))
    };
    let unused: Vec<String> = stratified_params
        .iter()
        .filter(|p| !still_used(p.as_str()))
        .cloned()
        .collect();
    for name in unused {
        parameters.shift_remove(&name);
    }

    let mut initials: IndexMap<String, Initial> = IndexMap::new();
    for initial in model.initials.values() {
        if preserved.contains(&initial.concept.name) {
            initials.insert(initial.concept.name.clone(), initial.clone());
            continue;
        }
        for stratum in &options.strata {
            let concept =
                stratified_concept(&initial.concept, &options.key, stratum, options.modify_names);
            initials.insert(
                concept.name.clone(),
                Initial {
                    concept,
                    expression: initial.expression.clone(),
                },
            );
        }
    }

    // Observables keep their meaning by summing over the strata of each
    // concept they mention.
    let mut observable_renames: BTreeMap<String, String> = BTreeMap::new();
    if options.modify_names {
        for name in known.iter().filter(|n| !preserved.contains(**n)) {
            let sum: Vec<String> = options
                .strata
                .iter()
                .map(|s| format!("{name}_{s}"))
                .collect();
            observable_renames.insert(name.to_string(), format!("({})", sum.join(" + ")));
        }
    }
    let observables = model
        .observables
        .iter()
        .map(|(name, observable)| {
            let mut observable = observable.clone();
            observable.expression = observable.expression.substitute(&observable_renames);
            (name.clone(), observable)
        })
        .collect();

    tracing::debug!(
        key = %options.key,
        strata = options.strata.len(),
        templates_in = model.templates.len(),
        templates_out = templates.len(),
        "stratified template model"
    );

    Ok(TemplateModel {
        templates,
        parameters,
        initials,
        observables,
        annotations: model.annotations.clone(),
    })
}
