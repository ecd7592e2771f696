//! Template models for compartmental epidemiology.
//!
//! A model is a list of transition templates over concepts:
//!
//! 1. **Concepts**: named entities, optionally grounded to ontology
//!    identifiers and optionally carrying context (`{"city": "boston"}`)
//! 2. **Templates**: typed processes with a fixed role map (controller(s),
//!    subject, outcome)
//! 3. **Models**: templates plus parameters, initials and observables
//!
//! Equality and refinement are defined here at the concept and template
//! level. Refinement between two different groundings is delegated to a
//! [`RefinementOracle`]; graph construction lives in `epimodel-compare`.
//!
//! ## Module Organization
//!
//! - `concept`: concepts, curies, keys, concept equality/refinement
//! - `template`: template variants, role maps, template equality/refinement
//! - `model`: `TemplateModel` and its JSON form
//! - `stratify`: context stratification of whole models
//! - `expr`: rate laws and other symbolic expressions

pub mod concept;
pub mod config;
pub mod error;
pub mod expr;
pub mod model;
pub mod stratify;
pub mod template;

// Re-export key types
pub use concept::{assert_concept_context_refinement, Concept, ConceptKey, Unit};
pub use config::{Config, DEFAULT_CONFIG};
pub use error::{ComparisonError, ModelError};
pub use expr::SymbolicExpr;
pub use model::{Annotations, Distribution, Initial, Observable, Parameter, TemplateModel};
pub use stratify::{stratify, StratifyOptions};
pub use template::{Role, RoleValue, Template, TemplateKey, TemplateKind, TemplateType};

pub use epimodel_ontology;
pub use epimodel_ontology::{NoRefinement, OracleError, RefinementOracle};
