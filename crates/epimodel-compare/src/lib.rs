//! Comparison graphs over template models.
//!
//! Two comparators share one vocabulary of edge roles:
//!
//! - intra-model `subject` / `outcome` / `controller` edges connect a
//!   template to its role concepts (concept -> template for inputs,
//!   template -> concept for the outcome)
//! - inter-model `is_equal` / `refinement_of` edges connect nodes of two
//!   different models (`refinement_of` points from the more specific node)
//!
//! [`TemplateModelDelta`] diffs exactly two models in one merged graph.
//! [`TemplateModelComparison`] handles any number of models, keeps each in
//! its own `(model_id, node_id)` space and scores pairwise similarity.
//!
//! Both comparators memoize oracle answers for the duration of one run and
//! fail fast on oracle errors.

pub mod comparison;
pub mod delta;
pub mod error;
pub mod graphdata;

pub use comparison::TemplateModelComparison;
pub use delta::{DeltaNode, DeltaNodeKind, NodeLink, TemplateModelDelta};
pub use error::CompareError;
pub use graphdata::{
    ConceptNode, DataEdge, DataNode, EdgeRole, ModelComparisonGraphdata, NodeId, SimilarityScore,
    TemplateNode,
};
