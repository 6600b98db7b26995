//! Failure taxonomy of a pipeline run.
//!
//! Every variant is terminal for the run it occurs in; nothing is retried
//! internally.

use modelgate_training::TrainingError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Serializable discriminant of [`PipelineError`], surfaced in `PipelineResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineErrorKind {
    DataUnavailable,
    DataGateFailed,
    TrainingFailed,
    TrainingTimeout,
    ModelUnhealthy,
    ModelGateFailed,
    ArtifactIdentityConflict,
    PublishFailed,
    Cancelled,
    InvalidRequest,
}

impl std::fmt::Display for PipelineErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DataUnavailable => "DataUnavailable",
            Self::DataGateFailed => "DataGateFailed",
            Self::TrainingFailed => "TrainingFailed",
            Self::TrainingTimeout => "TrainingTimeout",
            Self::ModelUnhealthy => "ModelUnhealthy",
            Self::ModelGateFailed => "ModelGateFailed",
            Self::ArtifactIdentityConflict => "ArtifactIdentityConflict",
            Self::PublishFailed => "PublishFailed",
            Self::Cancelled => "Cancelled",
            Self::InvalidRequest => "InvalidRequest",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("dataset unavailable: {0}")]
    DataUnavailable(String),

    #[error("data gate failed: {0}")]
    DataGateFailed(String),

    #[error("training failed: {0}")]
    TrainingFailed(String),

    #[error("training exceeded its time limit of {0:?}")]
    TrainingTimeout(Duration),

    #[error("model unhealthy: {0}")]
    ModelUnhealthy(String),

    #[error("model gate failed: {0}")]
    ModelGateFailed(String),

    /// Two different artifacts claim the same version identity. This is caller
    /// misuse (identity reuse), not a transient fault.
    #[error(
        "artifact identity conflict: {identity} is already published with sha256 {existing}, refusing to replace it with sha256 {incoming}"
    )]
    ArtifactIdentityConflict {
        identity: String,
        existing: String,
        incoming: String,
    },

    #[error("publish failed: {0}")]
    PublishFailed(String),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl PipelineError {
    #[must_use]
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            Self::DataUnavailable(_) => PipelineErrorKind::DataUnavailable,
            Self::DataGateFailed(_) => PipelineErrorKind::DataGateFailed,
            Self::TrainingFailed(_) => PipelineErrorKind::TrainingFailed,
            Self::TrainingTimeout(_) => PipelineErrorKind::TrainingTimeout,
            Self::ModelUnhealthy(_) => PipelineErrorKind::ModelUnhealthy,
            Self::ModelGateFailed(_) => PipelineErrorKind::ModelGateFailed,
            Self::ArtifactIdentityConflict { .. } => PipelineErrorKind::ArtifactIdentityConflict,
            Self::PublishFailed(_) => PipelineErrorKind::PublishFailed,
            Self::Cancelled => PipelineErrorKind::Cancelled,
            Self::InvalidRequest(_) => PipelineErrorKind::InvalidRequest,
        }
    }

    /// Wrap a lower-level training-crate error as a publish failure.
    pub(crate) fn publish(err: impl Into<TrainingError>) -> Self {
        Self::PublishFailed(err.into().to_string())
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let err = PipelineError::ArtifactIdentityConflict {
            identity: "abc".to_string(),
            existing: "1".to_string(),
            incoming: "2".to_string(),
        };
        assert_eq!(err.kind(), PipelineErrorKind::ArtifactIdentityConflict);
        assert!(err.to_string().contains("abc"));

        let err = PipelineError::TrainingTimeout(Duration::from_secs(3));
        assert_eq!(err.kind(), PipelineErrorKind::TrainingTimeout);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&PipelineErrorKind::DataGateFailed).unwrap();
        assert_eq!(json, "\"data_gate_failed\"");
        assert_eq!(PipelineErrorKind::DataGateFailed.to_string(), "DataGateFailed");
    }
}
