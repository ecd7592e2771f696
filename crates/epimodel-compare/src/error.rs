use epimodel_core::{ComparisonError, OracleError};

#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("model comparison needs at least 2 models, got {given}")]
    InsufficientModels { given: usize },

    #[error("unknown model id {0}")]
    UnknownModel(u32),

    #[error("{models} models but only {ids} model ids")]
    MissingModelIds { models: usize, ids: usize },

    #[error("model id {0} is used twice")]
    DuplicateModelId(u32),

    /// Both sides of a delta carry the same tag, so their templates would collide.
    #[error("both models are tagged `{0}`")]
    IdenticalTags(String),

    #[error(transparent)]
    Comparison(#[from] ComparisonError),

    #[error("invalid comparison graph JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<OracleError> for CompareError {
    fn from(err: OracleError) -> Self {
        CompareError::Comparison(err.into())
    }
}
