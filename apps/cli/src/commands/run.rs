//! Run command implementation.

use super::render;
use modelgate_core::pipeline::EXIT_USAGE;
use modelgate_core::{Pipeline, PipelineConfig, PipelineRequest};
use tokio_util::sync::CancellationToken;

/// Execute the full pipeline and return the process exit code.
pub async fn execute(
    config: &PipelineConfig,
    dataset: &str,
    commit: &str,
    json_output: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<i32> {
    let pipeline = match Pipeline::from_config(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            render::error(&e.to_string());
            return Ok(EXIT_USAGE);
        }
    };

    let request = PipelineRequest::new(dataset, commit).with_namespace(config.namespace());
    let result = pipeline.run(&request, cancel).await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        render::pipeline_result(&result);
    }
    Ok(result.exit_code())
}
