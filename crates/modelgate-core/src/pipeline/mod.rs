//! Pipeline orchestration: request, state machine, result.

pub mod orchestrator;
pub mod request;
pub mod result;
pub mod state;

pub use orchestrator::Pipeline;
pub use request::PipelineRequest;
pub use result::{
    EXIT_DATA, EXIT_MODEL, EXIT_PUBLISH, EXIT_SUCCESS, EXIT_TRAINING, EXIT_USAGE, PipelineResult, PipelineStatus,
    PublishedArtifact,
};
pub use state::PipelineState;
