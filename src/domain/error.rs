// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the training core can produce falls into one of
// these buckets. None of them is retried: a corrupted loss or a
// skipped batch would silently bias the optimisation trajectory,
// so everything propagates to the driving process.
//
// The application and CLI layers wrap these in anyhow::Error and
// can still recover the variant with `downcast_ref::<SpinError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpinError {
    /// Invalid hyperparameters or an unusable data split.
    /// Raised before the first iteration starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A batch is missing labels, or its rows and masks disagree.
    #[error("malformed batch: {0}")]
    Data(String),

    /// A required artifact is not on disk yet.
    #[error("missing artifact '{}': {hint}", path.display())]
    MissingArtifact { path: PathBuf, hint: String },

    /// Persisting or loading model state failed.
    #[error("resource error: {0}")]
    Resource(String),

    /// Forward, backward or generation failed.
    #[error("compute error: {0}")]
    Compute(String),

    /// The file is not a readable document of a supported format.
    #[error("cannot extract text from '{}': {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },
}

impl SpinError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn missing(path: impl Into<PathBuf>, hint: impl Into<String>) -> Self {
        Self::MissingArtifact { path: path.into(), hint: hint.into() }
    }

    /// True for failures that mean "run an earlier step first".
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingArtifact { .. })
    }
}

pub type SpinResult<T> = std::result::Result<T, SpinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = SpinError::config("beta must be >= 0");
        assert!(err.to_string().contains("invalid configuration"));
        assert!(err.to_string().contains("beta"));

        let err = SpinError::missing("checkpoints", "train before inference");
        assert!(err.to_string().contains("checkpoints"));
        assert!(err.to_string().contains("train before inference"));
        assert!(err.is_precondition());
    }

    #[test]
    fn test_only_missing_artifact_is_precondition() {
        assert!(!SpinError::data("x").is_precondition());
        assert!(!SpinError::Compute("x".into()).is_precondition());
    }
}
