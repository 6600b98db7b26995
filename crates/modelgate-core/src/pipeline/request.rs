use crate::config::pipeline_config::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trigger input for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Path, path relative to the data root, or `file://` URL.
    pub dataset_reference: String,
    /// Store namespace the artifact is published into.
    pub namespace: String,
    /// Commit or change id; becomes the run id and the artifact identity.
    pub commit_id: String,
    /// Overrides the pipeline's configured training limit.
    #[serde(default)]
    pub max_training_duration: Option<Duration>,
}

impl PipelineRequest {
    pub fn new(dataset_reference: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            dataset_reference: dataset_reference.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            commit_id: commit_id.into(),
            max_training_duration: None,
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_max_training_duration(mut self, limit: Option<Duration>) -> Self {
        self.max_training_duration = limit;
        self
    }
}
