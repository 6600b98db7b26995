//! Check-data command implementation.

use super::render;
use modelgate_core::pipeline::EXIT_USAGE;
use modelgate_core::{Pipeline, PipelineConfig};
use tokio_util::sync::CancellationToken;

/// Resolve and validate a dataset without training.
pub async fn execute(
    config: &PipelineConfig,
    dataset: &str,
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

    let result = pipeline.check_data(dataset, cancel).await;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        render::pipeline_result(&result);
    }
    Ok(result.exit_code())
}
