//! Template models: ordered templates plus parameters, initials and observables.
//!
//! Models are values. Operations that "change" a model (`add_template`,
//! `add_parameter`, stratification) return a new model.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::concept::{Concept, ConceptKey};
use crate::config::Config;
use crate::error::ModelError;
use crate::expr::SymbolicExpr;
use crate::template::Template;

// ============================================================================
// Model components
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: IndexMap<String, serde_json::Value>,
}

/// A parameter is a concept carrying a value and/or a distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(flatten)]
    pub concept: Concept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            concept: Concept::new(name),
            value,
            distribution: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.concept.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Initial {
    pub concept: Concept,
    pub expression: SymbolicExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observable {
    #[serde(flatten)]
    pub concept: Concept,
    pub expression: SymbolicExpr,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diseases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// Anything else the producer attached
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

// ============================================================================
// TemplateModel
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateModel {
    pub templates: Vec<Template>,
    #[serde(default)]
    pub parameters: IndexMap<String, Parameter>,
    #[serde(default)]
    pub initials: IndexMap<String, Initial>,
    #[serde(default)]
    pub observables: IndexMap<String, Observable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

impl TemplateModel {
    pub fn new(templates: Vec<Template>) -> Self {
        Self {
            templates,
            ..Self::default()
        }
    }

    // ========================================================================
    // JSON
    // ========================================================================

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read template model {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("failed to decode template model {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, ModelError> {
        Ok(serde_json::to_value(self)?)
    }

    // ========================================================================
    // Building
    // ========================================================================

    pub fn add_template(&self, template: Template) -> Self {
        let mut model = self.clone();
        model.templates.push(template);
        model
    }

    /// Add (or replace) a parameter by name.
    pub fn add_parameter(&self, parameter: Parameter) -> Self {
        let mut model = self.clone();
        model
            .parameters
            .insert(parameter.name().to_string(), parameter);
        model
    }

    pub fn with_initial(mut self, initial: Initial) -> Self {
        self.initials.insert(initial.concept.name.clone(), initial);
        self
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    // ========================================================================
    // Enumeration
    // ========================================================================

    /// Every role concept occurrence, in template then role order.
    pub fn get_concepts(&self) -> impl Iterator<Item = &Concept> {
        self.templates.iter().flat_map(|t| t.get_concepts())
    }

    /// Distinct role concepts by structural key; first occurrence wins.
    pub fn get_concepts_map(&self, config: &Config) -> IndexMap<ConceptKey, &Concept> {
        let mut concepts = IndexMap::new();
        for concept in self.get_concepts() {
            concepts.entry(concept.get_key(config)).or_insert(concept);
        }
        concepts
    }

    /// Distinct role concepts by name; first occurrence wins.
    pub fn get_concepts_name_map(&self) -> IndexMap<&str, &Concept> {
        let mut concepts = IndexMap::new();
        for concept in self.get_concepts() {
            concepts.entry(concept.name.as_str()).or_insert(concept);
        }
        concepts
    }

    pub fn get_concept(&self, name: &str) -> Result<&Concept, ModelError> {
        self.get_concepts()
            .find(|c| c.name == name)
            .ok_or_else(|| ModelError::UnknownConcept(name.to_string()))
    }

    pub fn get_templates_with_concept(&self, name: &str) -> Vec<&Template> {
        self.templates
            .iter()
            .filter(|t| t.get_concepts().iter().any(|c| c.name == name))
            .collect()
    }

    /// Names of this model's parameters that appear in the template's rate law.
    pub fn get_parameters_from_rate_law(&self, template: &Template) -> BTreeSet<String> {
        template
            .rate_law
            .as_ref()
            .map(|rate_law| {
                rate_law
                    .symbols()
                    .into_iter()
                    .filter(|symbol| self.parameters.contains_key(symbol))
                    .collect()
            })
            .unwrap_or_default()
    }
}
