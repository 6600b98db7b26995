//! Modelgate Core - gated train-and-publish pipeline.
//!
//! This crate provides the pipeline components:
//! - Dataset resolution against a mounted data store
//! - Data and model quality gates with structured reports
//! - Bounded training runs and pluggable trainer/runtime backends
//! - Atomic, idempotent publication into the artifact store
//!
//! # Example
//!
//! ```rust,no_run
//! use modelgate_core::{Pipeline, PipelineConfig, PipelineRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> modelgate_core::Result<()> {
//!     let config = PipelineConfig::default();
//!     let pipeline = Pipeline::from_config(&config)?;
//!     let request = PipelineRequest::new("data/cars.csv", "3f2a9c1");
//!     let result = pipeline.run(&request, &CancellationToken::new()).await;
//!     std::process::exit(result.exit_code());
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod publish;
pub mod resolver;
pub mod training;
pub mod validation;

pub use config::{BackendConfig, BackendKind, BaselineConfig, ConfigError, PipelineConfig};
pub use error::{PipelineError, PipelineErrorKind, Result};
pub use pipeline::{Pipeline, PipelineRequest, PipelineResult, PipelineState, PipelineStatus, PublishedArtifact};
pub use publish::{ArtifactStore, PublishOutcome};
pub use resolver::{DataSourceResolver, ResolvedDataset};
pub use training::{TrainingOutcome, TrainingRunner, runtime_from_config, trainer_from_config};
pub use validation::{
    BaselineRegressionCheck, CheckResult, DataValidator, ModelCheck, ModelValidator, ReportKind, ValidationReport,
};
