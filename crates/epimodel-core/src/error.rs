use epimodel_ontology::OracleError;

use crate::template::TemplateType;

/// Failures of the equality/refinement predicates.
#[derive(Debug, thiserror::Error)]
pub enum ComparisonError {
    /// Equality was asked of two templates of different types.
    #[error("cannot compare templates of different types: {left} vs {right}")]
    TypeMismatch {
        left: TemplateType,
        right: TemplateType,
    },

    /// A role holds a value shape the comparator does not handle.
    #[error("unsupported field `{field}` in template comparison")]
    UnsupportedField { field: String },

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Failures decoding or encoding template models.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid template model JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown concept `{0}`")]
    UnknownConcept(String),

    #[error("stratification along `{key}` needs at least one stratum")]
    EmptyStrata { key: String },
}
