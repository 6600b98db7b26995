use crate::dataset::DatasetFingerprint;
use crate::error::{TrainingError, TrainingResult};
use crate::trainer::TrainerOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const MAX_IDENTITY_LEN: usize = 128;

/// Version identity of a published artifact: the triggering commit/change id.
///
/// It becomes a directory name in the artifact store, so only
/// `[A-Za-z0-9._-]` is accepted and a leading `.` is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactIdentity(String);

impl ArtifactIdentity {
    pub fn parse(raw: &str) -> TrainingResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TrainingError::InvalidSpec("commit id is required".to_string()));
        }
        if raw.len() > MAX_IDENTITY_LEN {
            return Err(TrainingError::InvalidSpec(format!(
                "commit id longer than {MAX_IDENTITY_LEN} characters"
            )));
        }
        if raw.starts_with('.') {
            return Err(TrainingError::InvalidSpec(format!("commit id must not start with '.': {raw}")));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(TrainingError::InvalidSpec(format!(
                "commit id contains unsupported character {bad:?}: {raw}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier for one pipeline run, derived from the triggering commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    #[must_use]
    pub fn for_commit(identity: &ArtifactIdentity) -> Self {
        Self(identity.as_str().to_string())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What a [`crate::Trainer`] is asked to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub run_id: RunId,
    /// Validated dataset, read-only.
    pub dataset_path: PathBuf,
    /// Where the trainer must leave the serialized model.
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Record of one invocation of the training step.
///
/// Built by the training runner and frozen once the stage finishes; the
/// transition methods consume `self`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRun {
    pub run_id: RunId,
    pub dataset_path: PathBuf,
    pub dataset_fingerprint: Option<DatasetFingerprint>,
    pub artifact_path: PathBuf,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub status: RunStatus,
    /// Exit status of an external trainer, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl TrainingRun {
    #[must_use]
    pub fn pending(
        run_id: RunId,
        dataset_path: PathBuf,
        dataset_fingerprint: Option<DatasetFingerprint>,
        artifact_path: PathBuf,
    ) -> Self {
        Self {
            run_id,
            dataset_path,
            dataset_fingerprint,
            artifact_path,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: RunStatus::Pending,
            exit_code: None,
            log_tail: None,
            failure: None,
        }
    }

    #[must_use]
    pub fn started(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    /// Record what the trainer reported about itself.
    #[must_use]
    pub fn with_trainer_outcome(mut self, outcome: TrainerOutcome) -> Self {
        self.exit_code = outcome.exit_code;
        self.log_tail = outcome.log_tail;
        self
    }

    #[must_use]
    pub fn succeeded(self, at: DateTime<Utc>, duration_ms: u64) -> Self {
        self.finish(at, duration_ms, RunStatus::Succeeded, None)
    }

    #[must_use]
    pub fn failed(self, at: DateTime<Utc>, duration_ms: u64, reason: impl Into<String>) -> Self {
        self.finish(at, duration_ms, RunStatus::Failed, Some(reason.into()))
    }

    fn finish(mut self, at: DateTime<Utc>, duration_ms: u64, status: RunStatus, failure: Option<String>) -> Self {
        self.finished_at = Some(at);
        self.duration_ms = Some(duration_ms);
        self.status = status;
        self.failure = failure;
        self
    }
}
