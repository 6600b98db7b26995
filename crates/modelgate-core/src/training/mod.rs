//! Training and inference backends, and the bounded training runner.

pub mod linear;
pub mod process;
pub mod runner;

pub use linear::{LINEAR_MODEL_FORMAT, LinearModelRuntime, LinearPriceModel, LinearPriceTrainer};
pub use process::{ProcessModelRuntime, ProcessTrainer};
pub use runner::{StagedArtifact, TrainingOutcome, TrainingRunner};

use crate::config::{BackendConfig, BackendKind};
use crate::error::{PipelineError, Result};
use modelgate_training::{ModelRuntime, Trainer};
use std::sync::Arc;

fn process_command(section: &str, config: &BackendConfig) -> Result<String> {
    config
        .command
        .clone()
        .ok_or_else(|| PipelineError::InvalidRequest(format!("[{section}] kind = \"process\" requires a command")))
}

/// Build the trainer selected by a `[trainer]` section.
pub fn trainer_from_config(config: &BackendConfig) -> Result<Arc<dyn Trainer>> {
    Ok(match config.kind.unwrap_or_default() {
        BackendKind::Builtin => Arc::new(LinearPriceTrainer),
        BackendKind::Process => Arc::new(ProcessTrainer::new(process_command("trainer", config)?, config.args.clone())),
    })
}

/// Build the inference runtime selected by a `[runtime]` section.
pub fn runtime_from_config(config: &BackendConfig) -> Result<Arc<dyn ModelRuntime>> {
    Ok(match config.kind.unwrap_or_default() {
        BackendKind::Builtin => Arc::new(LinearModelRuntime),
        BackendKind::Process => {
            Arc::new(ProcessModelRuntime::new(process_command("runtime", config)?, config.args.clone()))
        }
    })
}
