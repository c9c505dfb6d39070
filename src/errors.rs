/// Domain-specific error types for intentrank
///
/// Errors are split by who has to act on them: configuration mistakes must be fixed
/// at the call site, data-insufficiency errors can be retried with a different corpus.
/// Every error reports its `ErrorKind` so callers can tell the two apart.

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingError;
use crate::projection::ProjectionError;

/// Coarse classification of an error for caller decision-making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Fix the call site or configuration; retrying with the same inputs will fail again.
    Configuration,
    /// The corpus or training data cannot support the operation; supply more data.
    DataInsufficiency,
    /// Transient or environmental failure (network, model download, I/O).
    Runtime,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid intent profile '{name}': {reason}")]
    InvalidProfile {
        name: String,
        reason: String,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
    },

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Corpus(e.to_string())
    }
}

impl EngineError {
    /// Helper to create profile errors with the offending profile name
    ///
    /// Example:
    /// ```
    /// use intentrank::errors::{EngineError, ErrorKind};
    /// let err = EngineError::invalid_profile("semantic", "weights sum to 1.2");
    /// assert_eq!(err.kind(), ErrorKind::Configuration);
    /// ```
    pub fn invalid_profile(name: &str, reason: &str) -> Self {
        EngineError::InvalidProfile {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Config(_)
            | EngineError::InvalidProfile { .. }
            | EngineError::DimensionMismatch { .. }
            | EngineError::Corpus(_) => ErrorKind::Configuration,
            EngineError::Projection(e) => e.kind(),
            EngineError::Embedding(e) => e.kind(),
            EngineError::Internal(_) => ErrorKind::Runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_propagates_from_projection() {
        let err: EngineError = ProjectionError::InsufficientTrainingSignal("no edges".into()).into();
        assert_eq!(err.kind(), ErrorKind::DataInsufficiency);

        let err: EngineError = ProjectionError::MissingSecondModel(
            crate::projection::ProjectionStrategy::SplitSpace,
        )
        .into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_dimension_mismatch_is_configuration() {
        let err = EngineError::DimensionMismatch { expected: 64, actual: 384 };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "Dimension mismatch: expected 64, got 384");
    }
}
