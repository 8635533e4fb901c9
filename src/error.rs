//! Error types for gating and consensus building.

use thiserror::Error;

/// Domain failures raised while resolving models, gating cells, or
/// aggregating purity calls.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GateError {
    /// A requested model has no definition (or no purity column).
    #[error("unknown model '{name}' (available: {})", .available.join(", "))]
    UnknownModel { name: String, available: Vec<String> },

    /// A gate table failed validation.
    #[error("invalid gate model '{model}': {reason}")]
    InvalidModel { model: String, reason: String },

    /// A column the classifier needs is not in the dataset.
    #[error("missing column '{0}' in cell metadata")]
    MissingColumn(String),

    /// Invalid run parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No cells to work on.
    #[error("dataset contains no cells")]
    EmptyDataset,
}

impl GateError {
    pub fn unknown_model<I, S>(name: &str, available: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GateError::UnknownModel {
            name: name.to_string(),
            available: available.into_iter().map(Into::into).collect(),
        }
    }

    pub fn invalid_model(model: &str, reason: impl Into<String>) -> Self {
        GateError::InvalidModel {
            model: model.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_names_the_missing_model() {
        let err = GateError::unknown_model("Foo.RM", ["Bcell.RM", "Tcell.RM"]);
        let msg = err.to_string();
        assert!(msg.contains("Foo.RM"));
        assert!(msg.contains("Bcell.RM, Tcell.RM"));
    }
}
