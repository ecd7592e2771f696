//! Multi-model comparison.
//!
//! Every model keeps its own node space; nothing is merged across models.
//! Models are connected only by explicit inter-model `is_equal` /
//! `refinement_of` edges, found by comparing every pair of nodes that
//! belong to different models.

use std::collections::BTreeMap;

use epimodel_core::{
    Concept, ConceptKey, Config, RefinementOracle, Role, Template, TemplateKey, TemplateModel,
};
use epimodel_ontology::CachedOracle;
use indexmap::{IndexMap, IndexSet};

use crate::error::CompareError;
use crate::graphdata::{
    ConceptNode, DataEdge, DataNode, EdgeRole, ModelComparisonGraphdata, NodeId, TemplateNode,
};

/// Accumulation-time node identity: model id plus structural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Template(u32, TemplateKey),
    Concept(u32, ConceptKey),
}

impl NodeKey {
    fn model_id(&self) -> u32 {
        match self {
            NodeKey::Template(model_id, _) | NodeKey::Concept(model_id, _) => *model_id,
        }
    }
}

#[derive(Default)]
struct Accumulator<'m> {
    nodes: IndexMap<NodeKey, DataNode>,
    templates: Vec<(NodeKey, &'m Template)>,
    concepts: Vec<(NodeKey, &'m Concept)>,
    intra: IndexSet<(NodeKey, NodeKey, EdgeRole)>,
    inter: IndexSet<(NodeKey, NodeKey, EdgeRole)>,
}

impl<'m> Accumulator<'m> {
    fn add_model(&mut self, model_id: u32, model: &'m TemplateModel, config: &Config) {
        for template in &model.templates {
            let template_key = NodeKey::Template(model_id, template.get_key(config));
            if !self.nodes.contains_key(&template_key) {
                self.nodes.insert(
                    template_key.clone(),
                    DataNode::Template(TemplateNode::from_template(model_id, template)),
                );
                self.templates.push((template_key.clone(), template));
            }

            for (role, value) in template.get_concepts_by_role() {
                for concept in value.concepts() {
                    let concept_key = NodeKey::Concept(model_id, concept.get_key(config));
                    if !self.nodes.contains_key(&concept_key) {
                        self.nodes.insert(
                            concept_key.clone(),
                            DataNode::Concept(ConceptNode::from_concept(model_id, concept, config)),
                        );
                        self.concepts.push((concept_key.clone(), concept));
                    }
                    let edge = match role {
                        Role::Subject => (concept_key, template_key.clone(), EdgeRole::Subject),
                        Role::Controller | Role::Controllers => {
                            (concept_key, template_key.clone(), EdgeRole::Controller)
                        }
                        Role::Outcome => (template_key.clone(), concept_key, EdgeRole::Outcome),
                    };
                    self.intra.insert(edge);
                }
            }
        }
    }

    fn compare_templates<O>(&mut self, oracle: &O, config: &Config) -> Result<(), CompareError>
    where
        O: RefinementOracle + ?Sized,
    {
        for (i, (key_a, a)) in self.templates.iter().enumerate() {
            for (key_b, b) in &self.templates[i + 1..] {
                if key_a.model_id() == key_b.model_id() {
                    continue;
                }
                // Different types are never related; skip before the equality check raises.
                if a.template_type() != b.template_type() {
                    continue;
                }
                let edge = if a.is_equal_to(b, true, config)? {
                    Some((key_a, key_b, EdgeRole::IsEqual))
                } else if a.refinement_of(b, oracle, true, config)? {
                    Some((key_a, key_b, EdgeRole::RefinementOf))
                } else if b.refinement_of(a, oracle, true, config)? {
                    Some((key_b, key_a, EdgeRole::RefinementOf))
                } else {
                    None
                };
                if let Some((source, target, role)) = edge {
                    self.inter.insert((source.clone(), target.clone(), role));
                }
            }
        }
        Ok(())
    }

    fn compare_concepts<O>(&mut self, oracle: &O, config: &Config) -> Result<(), CompareError>
    where
        O: RefinementOracle + ?Sized,
    {
        for (i, (key_a, a)) in self.concepts.iter().enumerate() {
            for (key_b, b) in &self.concepts[i + 1..] {
                if key_a.model_id() == key_b.model_id() {
                    continue;
                }
                let edge = if a.is_equal_to(b, true, config) {
                    Some((key_a, key_b, EdgeRole::IsEqual))
                } else if a.refinement_of(b, oracle, true, config)? {
                    Some((key_a, key_b, EdgeRole::RefinementOf))
                } else if b.refinement_of(a, oracle, true, config)? {
                    Some((key_b, key_a, EdgeRole::RefinementOf))
                } else {
                    None
                };
                if let Some((source, target, role)) = edge {
                    self.inter.insert((source.clone(), target.clone(), role));
                }
            }
        }
        Ok(())
    }

    /// Number nodes per model, templates first, and rewrite edges.
    fn reindex(
        self,
        models: &[TemplateModel],
        model_ids: impl Iterator<Item = u32>,
    ) -> ModelComparisonGraphdata {
        let mut data = ModelComparisonGraphdata::default();
        for (model_id, model) in model_ids.zip(models) {
            data.template_models.insert(model_id, model.clone());
            data.template_nodes.insert(model_id, BTreeMap::new());
            data.concept_nodes.insert(model_id, BTreeMap::new());
        }

        let mut next_id: BTreeMap<u32, u32> = BTreeMap::new();
        let mut ids: IndexMap<&NodeKey, NodeId> = IndexMap::new();
        let template_pass = self
            .nodes
            .iter()
            .filter(|(_, node)| matches!(node, DataNode::Template(_)));
        let concept_pass = self
            .nodes
            .iter()
            .filter(|(_, node)| matches!(node, DataNode::Concept(_)));
        for (key, node) in template_pass.chain(concept_pass) {
            let model_id = key.model_id();
            let counter = next_id.entry(model_id).or_insert(0);
            let node_id = *counter;
            *counter += 1;
            ids.insert(key, (model_id, node_id));
            match node {
                DataNode::Template(payload) => {
                    data.template_nodes
                        .entry(model_id)
                        .or_default()
                        .insert(node_id, payload.clone());
                }
                DataNode::Concept(payload) => {
                    data.concept_nodes
                        .entry(model_id)
                        .or_default()
                        .insert(node_id, payload.clone());
                }
            }
        }

        let rewrite = |edges: &IndexSet<(NodeKey, NodeKey, EdgeRole)>| -> Vec<DataEdge> {
            edges
                .iter()
                .filter_map(|(source, target, role)| {
                    Some(DataEdge(*ids.get(source)?, *ids.get(target)?, *role))
                })
                .collect()
        };
        data.intra_model_edges = rewrite(&self.intra);
        data.inter_model_edges = rewrite(&self.inter);
        data
    }
}

/// Comparison of N >= 2 template models.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateModelComparison {
    pub model_comparison: ModelComparisonGraphdata,
}

impl TemplateModelComparison {
    /// Compare `models`, numbering them 0, 1, ... in input order.
    pub fn new<O>(models: &[TemplateModel], oracle: &O, config: &Config) -> Result<Self, CompareError>
    where
        O: RefinementOracle + ?Sized,
    {
        Self::with_model_ids(models, 0.., oracle, config)
    }

    /// Compare `models` under caller-chosen model ids (one per model, in order).
    pub fn with_model_ids<O>(
        models: &[TemplateModel],
        model_ids: impl IntoIterator<Item = u32>,
        oracle: &O,
        config: &Config,
    ) -> Result<Self, CompareError>
    where
        O: RefinementOracle + ?Sized,
    {
        if models.len() < 2 {
            return Err(CompareError::InsufficientModels {
                given: models.len(),
            });
        }
        let model_ids: Vec<u32> = model_ids.into_iter().take(models.len()).collect();
        if model_ids.len() < models.len() {
            return Err(CompareError::MissingModelIds {
                models: models.len(),
                ids: model_ids.len(),
            });
        }
        let mut seen = IndexSet::new();
        for &model_id in &model_ids {
            if !seen.insert(model_id) {
                return Err(CompareError::DuplicateModelId(model_id));
            }
        }

        let oracle = CachedOracle::new(oracle);
        let mut acc = Accumulator::default();
        for (&model_id, model) in model_ids.iter().zip(models) {
            acc.add_model(model_id, model, config);
        }
        tracing::debug!(
            models = models.len(),
            templates = acc.templates.len(),
            concepts = acc.concepts.len(),
            "comparing template models"
        );

        acc.compare_templates(&oracle, config)?;
        acc.compare_concepts(&oracle, config)?;
        tracing::debug!(
            intra_edges = acc.intra.len(),
            inter_edges = acc.inter.len(),
            oracle_queries = oracle.misses(),
            oracle_cache_hits = oracle.hits(),
            "template model comparison finished"
        );

        Ok(Self {
            model_comparison: acc.reindex(models, model_ids.into_iter()),
        })
    }

    pub fn into_graphdata(self) -> ModelComparisonGraphdata {
        self.model_comparison
    }
}
