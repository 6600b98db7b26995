use crate::job::RunId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { run_id: RunId },
    StageStarted { run_id: RunId, stage: String },
    StageFinished { run_id: RunId, stage: String, ok: bool },
    CheckEvaluated { run_id: RunId, check: String, passed: bool, message: String },
    Finished { run_id: RunId, succeeded: bool },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Forwards progress events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { run_id } => info!(%run_id, "pipeline started"),
            ProgressEvent::StageStarted { run_id, stage } => info!(%run_id, %stage, "stage started"),
            ProgressEvent::StageFinished { run_id, stage, ok } => {
                if ok {
                    info!(%run_id, %stage, "stage finished");
                } else {
                    warn!(%run_id, %stage, "stage failed");
                }
            }
            ProgressEvent::CheckEvaluated { run_id, check, passed, message } => {
                if passed {
                    debug!(%run_id, %check, %message, "check passed");
                } else {
                    warn!(%run_id, %check, %message, "check failed");
                }
            }
            ProgressEvent::Finished { run_id, succeeded } => info!(%run_id, succeeded, "pipeline finished"),
        }
    }
}
