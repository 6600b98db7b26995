use super::state::PipelineState;
use crate::error::PipelineErrorKind;
use crate::publish::PublishOutcome;
use crate::validation::ValidationReport;
use chrono::{DateTime, Utc};
use modelgate_training::{RunId, TrainingRun};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_DATA: i32 = 1;
pub const EXIT_TRAINING: i32 = 2;
pub const EXIT_MODEL: i32 = 3;
pub const EXIT_PUBLISH: i32 = 4;
/// Malformed invocation or configuration (`EX_USAGE`).
pub const EXIT_USAGE: i32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineStatus {
    Succeeded,
    Failed {
        /// Stage that was running when the run failed.
        stage: PipelineState,
        kind: PipelineErrorKind,
        message: String,
    },
}

/// Identity and location of a published model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedArtifact {
    pub identity: String,
    pub location: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
    pub already_present: bool,
}

impl From<PublishOutcome> for PublishedArtifact {
    fn from(outcome: PublishOutcome) -> Self {
        Self {
            identity: outcome.identity.to_string(),
            location: outcome.location,
            sha256: outcome.metadata.sha256,
            size_bytes: outcome.metadata.size_bytes,
            already_present: outcome.already_present,
        }
    }
}

/// Everything a caller needs to act on a run without re-running it.
///
/// Reports are attached only once complete. `training_run` is `None` when
/// training was never attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: RunId,
    pub status: PipelineStatus,
    /// States entered, in order, ending with the terminal state.
    pub transitions: Vec<PipelineState>,
    pub data_report: Option<ValidationReport>,
    pub training_run: Option<TrainingRun>,
    pub model_report: Option<ValidationReport>,
    pub published: Option<PublishedArtifact>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.status, PipelineStatus::Succeeded)
    }

    /// Process exit code for CLI front-ends.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match &self.status {
            PipelineStatus::Succeeded => EXIT_SUCCESS,
            PipelineStatus::Failed { kind: PipelineErrorKind::Cancelled, stage, .. } => stage_exit_code(*stage),
            PipelineStatus::Failed { kind, .. } => kind_exit_code(*kind),
        }
    }
}

fn kind_exit_code(kind: PipelineErrorKind) -> i32 {
    match kind {
        PipelineErrorKind::DataUnavailable | PipelineErrorKind::DataGateFailed => EXIT_DATA,
        PipelineErrorKind::TrainingFailed | PipelineErrorKind::TrainingTimeout => EXIT_TRAINING,
        PipelineErrorKind::ModelUnhealthy | PipelineErrorKind::ModelGateFailed => EXIT_MODEL,
        PipelineErrorKind::ArtifactIdentityConflict | PipelineErrorKind::PublishFailed => EXIT_PUBLISH,
        PipelineErrorKind::InvalidRequest => EXIT_USAGE,
        // Only reached through `exit_code`, which maps cancellation by stage.
        PipelineErrorKind::Cancelled => EXIT_DATA,
    }
}

fn stage_exit_code(stage: PipelineState) -> i32 {
    match stage {
        PipelineState::Training => EXIT_TRAINING,
        PipelineState::ValidatingModel => EXIT_MODEL,
        PipelineState::Publishing => EXIT_PUBLISH,
        _ => EXIT_DATA,
    }
}
