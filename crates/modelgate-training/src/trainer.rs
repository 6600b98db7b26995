use crate::error::TrainingResult;
use crate::job::TrainingRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a trainer reports besides the artifact it wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerOutcome {
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_tail: Option<String>,
}

/// The opaque training step.
///
/// Implementations read `request.dataset_path` and write a serialized model to
/// `request.output_path`. Returning `Err` means the step failed. The caller checks
/// the output file itself and bounds the call with its own timeout, so the
/// returned future must be safe to drop at any await point.
#[async_trait]
pub trait Trainer: Send + Sync {
    fn id(&self) -> &'static str;

    async fn train(&self, request: &TrainingRequest) -> TrainingResult<TrainerOutcome>;
}
