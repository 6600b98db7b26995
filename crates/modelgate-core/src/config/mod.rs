//! Configuration for pipeline runs.

pub mod pipeline_config;

pub use pipeline_config::{
    BackendConfig, BackendKind, BaselineConfig, ConfigError, ConfigResult, PipelineConfig,
};
