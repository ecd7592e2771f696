//! Pairwise comparison: one merged graph for two template models.
//!
//! Unlike the multi-model comparison, concepts are merged across the two
//! models when their structural keys match exactly. Templates are never
//! merged; structurally identical templates of the two models are linked
//! by `is_equal` edges instead.
//!
//! Build order:
//!
//! 1. model 1 nodes and role edges, tagged with `tag1`
//! 2. model 2 nodes and role edges: exact concept matches gain `tag2`,
//!    same-grounding concepts with a different context become contraction
//!    candidates, everything else is new and tagged `tag2`
//! 3. `refinement_of` edges between unmerged concepts of the two models
//! 4. `is_equal` / `refinement_of` edges between templates of the two models
//! 5. contraction of the candidates from step 2 into their model 1 node

use std::collections::BTreeSet;

use epimodel_core::{
    Concept, ConceptKey, Config, RefinementOracle, Role, Template, TemplateKey, TemplateModel,
};
use epimodel_ontology::CachedOracle;
use indexmap::IndexMap;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::Serialize;

use crate::error::CompareError;
use crate::graphdata::EdgeRole;

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum DeltaNodeKind {
    Template(Template),
    Concept(Concept),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaNode {
    #[serde(flatten)]
    pub kind: DeltaNodeKind,
    /// Which model(s) the node came from; two tags means merged
    pub tags: BTreeSet<String>,
}

impl DeltaNode {
    pub fn is_merged(&self) -> bool {
        self.tags.len() > 1
    }

    pub fn as_concept(&self) -> Option<&Concept> {
        match &self.kind {
            DeltaNodeKind::Concept(concept) => Some(concept),
            DeltaNodeKind::Template(_) => None,
        }
    }

    pub fn as_template(&self) -> Option<&Template> {
        match &self.kind {
            DeltaNodeKind::Template(template) => Some(template),
            DeltaNodeKind::Concept(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DeltaKey {
    Template(TemplateKey, String),
    Concept(ConceptKey),
}

// ============================================================================
// Node-link export
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct NodeLinkNode<'a> {
    pub id: usize,
    #[serde(flatten)]
    pub node: &'a DeltaNode,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeLinkEdge {
    pub source: usize,
    pub target: usize,
    pub role: EdgeRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeLink<'a> {
    pub directed: bool,
    pub multigraph: bool,
    pub nodes: Vec<NodeLinkNode<'a>>,
    pub links: Vec<NodeLinkEdge>,
}

// ============================================================================
// TemplateModelDelta
// ============================================================================

pub struct TemplateModelDelta {
    graph: StableDiGraph<DeltaNode, EdgeRole>,
    tag1: String,
    tag2: String,
}

impl TemplateModelDelta {
    pub fn new<O>(
        model1: &TemplateModel,
        model2: &TemplateModel,
        oracle: &O,
        tag1: &str,
        tag2: &str,
        config: &Config,
    ) -> Result<Self, CompareError>
    where
        O: RefinementOracle + ?Sized,
    {
        if tag1 == tag2 {
            return Err(CompareError::IdenticalTags(tag1.to_string()));
        }
        let oracle = CachedOracle::new(oracle);
        let mut builder = DeltaBuilder {
            graph: StableDiGraph::new(),
            index: IndexMap::new(),
            contractions: Vec::new(),
        };

        builder.merge_model(model1, tag1, None, config);
        builder.merge_model(model2, tag2, Some(tag1), config);
        builder.add_concept_refinements(tag1, tag2, &oracle, config)?;
        builder.add_template_relations(tag1, tag2, &oracle, config)?;
        builder.apply_contractions();

        tracing::debug!(
            nodes = builder.graph.node_count(),
            edges = builder.graph.edge_count(),
            oracle_queries = oracle.misses(),
            "template model delta built"
        );

        Ok(Self {
            graph: builder.graph,
            tag1: tag1.to_string(),
            tag2: tag2.to_string(),
        })
    }

    pub fn graph(&self) -> &StableDiGraph<DeltaNode, EdgeRole> {
        &self.graph
    }

    pub fn tags(&self) -> (&str, &str) {
        (&self.tag1, &self.tag2)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// `(source, target)` node pairs of every edge with `role`.
    pub fn edges_with_role(&self, role: EdgeRole) -> Vec<(&DeltaNode, &DeltaNode)> {
        self.graph
            .edge_references()
            .filter(|edge| *edge.weight() == role)
            .filter_map(|edge| {
                Some((
                    self.graph.node_weight(edge.source())?,
                    self.graph.node_weight(edge.target())?,
                ))
            })
            .collect()
    }

    pub fn find_concept_nodes(&self, name: &str) -> Vec<&DeltaNode> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx))
            .filter(|node| node.as_concept().is_some_and(|c| c.name == name))
            .collect()
    }

    pub fn to_node_link(&self) -> NodeLink<'_> {
        NodeLink {
            directed: true,
            multigraph: true,
            nodes: self
                .graph
                .node_indices()
                .filter_map(|idx| {
                    Some(NodeLinkNode {
                        id: idx.index(),
                        node: self.graph.node_weight(idx)?,
                    })
                })
                .collect(),
            links: self
                .graph
                .edge_references()
                .map(|edge| NodeLinkEdge {
                    source: edge.source().index(),
                    target: edge.target().index(),
                    role: *edge.weight(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, CompareError> {
        Ok(serde_json::to_value(self.to_node_link())?)
    }
}

struct DeltaBuilder {
    graph: StableDiGraph<DeltaNode, EdgeRole>,
    index: IndexMap<DeltaKey, NodeIndex>,
    /// `(node to remove, node to merge it into)`, applied last
    contractions: Vec<(NodeIndex, NodeIndex)>,
}

impl DeltaBuilder {
    /// Add one model's nodes and role edges. `merge_into` names the tag of an
    /// already-merged model whose concepts may absorb this model's concepts.
    fn merge_model(
        &mut self,
        model: &TemplateModel,
        tag: &str,
        merge_into: Option<&str>,
        config: &Config,
    ) {
        for template in &model.templates {
            let key = DeltaKey::Template(template.get_key(config), tag.to_string());
            // A structural duplicate within one model adds nothing new.
            if self.index.contains_key(&key) {
                continue;
            }
            let template_idx = self.graph.add_node(DeltaNode {
                kind: DeltaNodeKind::Template(template.clone()),
                tags: BTreeSet::from([tag.to_string()]),
            });
            self.index.insert(key, template_idx);

            for (role, value) in template.get_concepts_by_role() {
                for concept in value.concepts() {
                    let concept_idx = self.concept_node(concept, tag, merge_into, config);
                    let (source, target, edge_role) = match role {
                        Role::Subject => (concept_idx, template_idx, EdgeRole::Subject),
                        Role::Controller | Role::Controllers => {
                            (concept_idx, template_idx, EdgeRole::Controller)
                        }
                        Role::Outcome => (template_idx, concept_idx, EdgeRole::Outcome),
                    };
                    self.graph.add_edge(source, target, edge_role);
                }
            }
        }
    }

    fn concept_node(
        &mut self,
        concept: &Concept,
        tag: &str,
        merge_into: Option<&str>,
        config: &Config,
    ) -> NodeIndex {
        let key = DeltaKey::Concept(concept.get_key(config));
        if let Some(&idx) = self.index.get(&key) {
            if let Some(node) = self.graph.node_weight_mut(idx) {
                node.tags.insert(tag.to_string());
            }
            return idx;
        }

        let idx = self.graph.add_node(DeltaNode {
            kind: DeltaNodeKind::Concept(concept.clone()),
            tags: BTreeSet::from([tag.to_string()]),
        });
        self.index.insert(key, idx);

        if let Some(other_tag) = merge_into {
            let curie = concept.get_curie(config);
            let candidates: Vec<NodeIndex> = self
                .index
                .iter()
                .filter_map(|(key, &other)| match key {
                    DeltaKey::Concept(k)
                        if other != idx
                            && (k.curie.0.as_str(), k.curie.1.as_str()) == curie =>
                    {
                        Some(other)
                    }
                    _ => None,
                })
                .filter(|&other| {
                    self.graph
                        .node_weight(other)
                        .is_some_and(|node| node.tags.contains(other_tag))
                })
                .collect();
            if let Some(&target) = candidates.first() {
                if candidates.len() > 1 {
                    tracing::warn!(
                        concept = %concept.name,
                        candidates = candidates.len(),
                        "several near-match concepts; contracting into the first"
                    );
                }
                self.contractions.push((idx, target));
            }
        }
        idx
    }

    fn nodes_tagged_only(&self, tag: &str) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .node_weight(idx)
                    .is_some_and(|node| node.tags.len() == 1 && node.tags.contains(tag))
            })
            .collect()
    }

    fn add_concept_refinements<O>(
        &mut self,
        tag1: &str,
        tag2: &str,
        oracle: &O,
        config: &Config,
    ) -> Result<(), CompareError>
    where
        O: RefinementOracle + ?Sized,
    {
        let concepts = |idx: &NodeIndex| {
            self.graph
                .node_weight(*idx)
                .and_then(DeltaNode::as_concept)
                .map(|c| (*idx, c.clone()))
        };
        let left: Vec<(NodeIndex, Concept)> =
            self.nodes_tagged_only(tag1).iter().filter_map(concepts).collect();
        let right: Vec<(NodeIndex, Concept)> =
            self.nodes_tagged_only(tag2).iter().filter_map(concepts).collect();

        for (idx1, c1) in &left {
            for (idx2, c2) in &right {
                if c2.refinement_of(c1, oracle, true, config)? {
                    self.graph.add_edge(*idx2, *idx1, EdgeRole::RefinementOf);
                }
                if c1.refinement_of(c2, oracle, true, config)? {
                    self.graph.add_edge(*idx1, *idx2, EdgeRole::RefinementOf);
                }
            }
        }
        Ok(())
    }

    fn add_template_relations<O>(
        &mut self,
        tag1: &str,
        tag2: &str,
        oracle: &O,
        config: &Config,
    ) -> Result<(), CompareError>
    where
        O: RefinementOracle + ?Sized,
    {
        let templates = |tag: &str| -> Vec<(NodeIndex, Template)> {
            self.nodes_tagged_only(tag)
                .into_iter()
                .filter_map(|idx| {
                    self.graph
                        .node_weight(idx)
                        .and_then(DeltaNode::as_template)
                        .map(|t| (idx, t.clone()))
                })
                .collect()
        };
        let left = templates(tag1);
        let right = templates(tag2);

        for (idx1, t1) in &left {
            for (idx2, t2) in &right {
                if t1.template_type() != t2.template_type() {
                    continue;
                }
                if t1.is_equal_to(t2, true, config)? {
                    self.graph.add_edge(*idx1, *idx2, EdgeRole::IsEqual);
                    self.graph.add_edge(*idx2, *idx1, EdgeRole::IsEqual);
                } else if t1.refinement_of(t2, oracle, true, config)? {
                    self.graph.add_edge(*idx1, *idx2, EdgeRole::RefinementOf);
                } else if t2.refinement_of(t1, oracle, true, config)? {
                    self.graph.add_edge(*idx2, *idx1, EdgeRole::RefinementOf);
                }
            }
        }
        Ok(())
    }

    /// Second pass: fold every candidate into its target, rewiring edges.
    fn apply_contractions(&mut self) {
        if !self.contractions.is_empty() {
            tracing::debug!(
                contractions = self.contractions.len(),
                "contracting near-match concept nodes"
            );
        }
        for (victim, target) in std::mem::take(&mut self.contractions) {
            let redirect = |idx: NodeIndex| if idx == victim { target } else { idx };
            let outgoing: Vec<(NodeIndex, EdgeRole)> = self
                .graph
                .edges_directed(victim, Direction::Outgoing)
                .map(|edge| (redirect(edge.target()), *edge.weight()))
                .collect();
            let incoming: Vec<(NodeIndex, EdgeRole)> = self
                .graph
                .edges_directed(victim, Direction::Incoming)
                .filter(|edge| edge.source() != victim)
                .map(|edge| (edge.source(), *edge.weight()))
                .collect();

            let Some(removed) = self.graph.remove_node(victim) else {
                continue;
            };
            if let Some(node) = self.graph.node_weight_mut(target) {
                node.tags.extend(removed.tags);
            }
            // A node neither equals nor refines itself; role loops survive.
            for (to, role) in outgoing {
                if to == target && role.is_inter_model() {
                    continue;
                }
                self.graph.add_edge(target, to, role);
            }
            for (from, role) in incoming {
                if from == target && role.is_inter_model() {
                    continue;
                }
                self.graph.add_edge(from, target, role);
            }
        }
    }
}
