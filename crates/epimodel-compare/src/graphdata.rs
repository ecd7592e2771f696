//! `ModelComparisonGraphdata`: the re-indexed output of a multi-model comparison.
//!
//! Nodes are addressed by `(model_id, node_id)`. Within a model, template
//! nodes are numbered first and concept nodes after them, both in the order
//! they were accumulated.
//!
//! JSON layout (node-link):
//!
//! ```text
//! {
//!   "template_models":   {model_id: <TemplateModel>},
//!   "template_nodes":    {model_id: {node_id: <TemplateNode>}},
//!   "concept_nodes":     {model_id: {node_id: <ConceptNode>}},
//!   "inter_model_edges": [[[m, n], [m, n], "is_equal" | "refinement_of"], ...],
//!   "intra_model_edges": [[[m, n], [m, n], "subject" | "outcome" | "controller"], ...]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::Context;
use epimodel_core::{Concept, Config, SymbolicExpr, Template, TemplateModel, TemplateType};
use serde::{Deserialize, Serialize};

use crate::error::CompareError;

/// `(model_id, node_id)`
pub type NodeId = (u32, u32);

// ============================================================================
// Edges
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRole {
    Subject,
    Outcome,
    Controller,
    IsEqual,
    RefinementOf,
}

impl EdgeRole {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeRole::Subject => "subject",
            EdgeRole::Outcome => "outcome",
            EdgeRole::Controller => "controller",
            EdgeRole::IsEqual => "is_equal",
            EdgeRole::RefinementOf => "refinement_of",
        }
    }

    /// `is_equal` and `refinement_of` connect nodes of different models.
    pub fn is_inter_model(self) -> bool {
        matches!(self, EdgeRole::IsEqual | EdgeRole::RefinementOf)
    }
}

/// `(source, target, role)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataEdge(pub NodeId, pub NodeId, pub EdgeRole);

impl DataEdge {
    pub fn source(&self) -> NodeId {
        self.0
    }

    pub fn target(&self) -> NodeId {
        self.1
    }

    pub fn role(&self) -> EdgeRole {
        self.2
    }
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub model_id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// `prefix:id` of the chosen grounding; absent for ungrounded concepts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curie: Option<String>,
    #[serde(default)]
    pub identifiers: BTreeMap<String, String>,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ConceptNode {
    pub fn from_concept(model_id: u32, concept: &Concept, config: &Config) -> Self {
        Self {
            model_id,
            name: concept.name.clone(),
            display_name: concept.display_name.clone(),
            curie: concept.get_curie_str(config),
            identifiers: concept.identifiers.clone(),
            context: concept.context.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateNode {
    pub model_id: u32,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_law: Option<SymbolicExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TemplateNode {
    pub fn from_template(model_id: u32, template: &Template) -> Self {
        Self {
            model_id,
            template_type: template.template_type(),
            rate_law: template.rate_law.clone(),
            name: template.name.clone(),
        }
    }
}

/// A node payload tagged with its kind (`"node_type": "template" | "concept"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum DataNode {
    Template(TemplateNode),
    Concept(ConceptNode),
}

impl DataNode {
    pub fn model_id(&self) -> u32 {
        match self {
            DataNode::Template(node) => node.model_id,
            DataNode::Concept(node) => node.model_id,
        }
    }
}

// ============================================================================
// Graph data
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub models: (u32, u32),
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelComparisonGraphdata {
    pub template_models: BTreeMap<u32, TemplateModel>,
    pub template_nodes: BTreeMap<u32, BTreeMap<u32, TemplateNode>>,
    pub concept_nodes: BTreeMap<u32, BTreeMap<u32, ConceptNode>>,
    pub inter_model_edges: Vec<DataEdge>,
    pub intra_model_edges: Vec<DataEdge>,
}

impl ModelComparisonGraphdata {
    pub fn from_json(json: &str) -> Result<Self, CompareError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read comparison graph {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("failed to decode comparison graph {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String, CompareError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn model_count(&self) -> usize {
        self.template_models.len()
    }

    pub fn get_node(&self, id: NodeId) -> Option<DataNode> {
        let (model_id, node_id) = id;
        if let Some(node) = self
            .template_nodes
            .get(&model_id)
            .and_then(|nodes| nodes.get(&node_id))
        {
            return Some(DataNode::Template(node.clone()));
        }
        self.concept_nodes
            .get(&model_id)
            .and_then(|nodes| nodes.get(&node_id))
            .map(|node| DataNode::Concept(node.clone()))
    }

    fn concept_ids(&self, model_id: u32) -> Result<BTreeSet<u32>, CompareError> {
        if !self.template_models.contains_key(&model_id) {
            return Err(CompareError::UnknownModel(model_id));
        }
        Ok(self
            .concept_nodes
            .get(&model_id)
            .map(|nodes| nodes.keys().copied().collect())
            .unwrap_or_default())
    }

    /// Fraction of the larger model's concepts that have a counterpart in
    /// the other model: 1 for an `is_equal` partner, 0.5 for a
    /// `refinement_of` partner in either direction, 0 otherwise.
    ///
    /// The larger model (by concept count) is always the reference, with
    /// ties going to the lower model id, so argument order does not matter.
    /// Two models without concepts score 0.
    pub fn get_similarity_score(&self, model_a: u32, model_b: u32) -> Result<f64, CompareError> {
        let mut a = (model_a, self.concept_ids(model_a)?);
        let mut b = (model_b, self.concept_ids(model_b)?);
        if a.1.len() < b.1.len() || (a.1.len() == b.1.len() && a.0 > b.0) {
            std::mem::swap(&mut a, &mut b);
        }
        let (a_id, a_nodes) = a;
        let (b_id, b_nodes) = b;

        // relation -> node in a -> related nodes in b
        let mut index: BTreeMap<EdgeRole, BTreeMap<u32, BTreeSet<u32>>> = BTreeMap::new();
        for edge in &self.inter_model_edges {
            let ((source_model, source), (target_model, target)) = (edge.source(), edge.target());
            let pair = if source_model == a_id && target_model == b_id {
                (source, target)
            } else if source_model == b_id && target_model == a_id {
                (target, source)
            } else {
                continue;
            };
            if a_nodes.contains(&pair.0) && b_nodes.contains(&pair.1) {
                index
                    .entry(edge.role())
                    .or_default()
                    .entry(pair.0)
                    .or_default()
                    .insert(pair.1);
            }
        }

        if a_nodes.is_empty() {
            return Ok(0.0);
        }
        let has_partner = |role: EdgeRole, node: &u32| {
            index
                .get(&role)
                .and_then(|partners| partners.get(node))
                .is_some_and(|set| !set.is_empty())
        };
        let score: f64 = a_nodes
            .iter()
            .map(|node| {
                if has_partner(EdgeRole::IsEqual, node) {
                    1.0
                } else if has_partner(EdgeRole::RefinementOf, node) {
                    0.5
                } else {
                    0.0
                }
            })
            .sum();
        Ok(score / a_nodes.len() as f64)
    }

    /// Scores for every unordered pair of models, in `(i, j)` order with `i < j`.
    pub fn get_similarity_scores(&self) -> Result<Vec<SimilarityScore>, CompareError> {
        let ids: Vec<u32> = self.template_models.keys().copied().collect();
        let mut scores = Vec::new();
        for (pos, &i) in ids.iter().enumerate() {
            for &j in &ids[pos + 1..] {
                scores.push(SimilarityScore {
                    models: (i, j),
                    score: self.get_similarity_score(i, j)?,
                });
            }
        }
        Ok(scores)
    }
}
