use serde::{Deserialize, Serialize};

/// Stages of one pipeline run.
///
/// Runs move forward through `Resolving → ValidatingData → Training →
/// ValidatingModel → Publishing → Succeeded`; any stage may go to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Resolving,
    ValidatingData,
    Training,
    ValidatingModel,
    Publishing,
    Succeeded,
    Failed,
}

impl PipelineState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::ValidatingData => "validating_data",
            Self::Training => "training",
            Self::ValidatingModel => "validating_model",
            Self::Publishing => "publishing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
