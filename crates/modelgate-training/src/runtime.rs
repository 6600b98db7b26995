use crate::dataset::CarRecord;
use crate::error::TrainingResult;
use async_trait::async_trait;
use std::path::Path;

/// Loads serialized models for inference.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    fn id(&self) -> &'static str;

    async fn load(&self, path: &Path) -> TrainingResult<Box<dyn LoadedModel>>;
}

/// A model ready to predict `price` for well-formed records.
#[async_trait]
pub trait LoadedModel: Send + Sync {
    /// One prediction per input row, in order.
    async fn predict(&self, rows: &[CarRecord]) -> TrainingResult<Vec<f64>>;
}
