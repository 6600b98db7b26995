//! CLI configuration loading and merging.

use super::{Args, Command};
use anyhow::Context;
use modelgate_core::PipelineConfig;
use std::path::{Path, PathBuf};

/// Values given on the command line. They override every config layer.
#[derive(Debug, Default)]
pub struct Overrides {
    store_root: Option<PathBuf>,
    namespace: Option<String>,
    work_dir: Option<PathBuf>,
    data_root: Option<PathBuf>,
    max_training_secs: Option<u64>,
}

impl Overrides {
    pub fn from_args(args: &Args) -> Self {
        let mut overrides =
            Self { store_root: args.store_root.clone(), namespace: args.namespace.clone(), ..Self::default() };
        match &args.command {
            Command::Run { work_dir, data_root, max_training_secs, .. } => {
                overrides.work_dir.clone_from(work_dir);
                overrides.data_root.clone_from(data_root);
                overrides.max_training_secs = *max_training_secs;
            }
            Command::CheckData { data_root, .. } => overrides.data_root.clone_from(data_root),
            Command::List { .. } | Command::Show { .. } => {}
        }
        overrides
    }

    fn as_config(&self) -> PipelineConfig {
        PipelineConfig {
            store_root: self.store_root.clone(),
            namespace: self.namespace.clone(),
            work_dir: self.work_dir.clone(),
            data_root: self.data_root.clone(),
            max_training_secs: self.max_training_secs,
            ..PipelineConfig::default()
        }
    }
}

/// Load and merge configuration.
///
/// Precedence, highest first:
/// 1. CLI arguments
/// 2. `MODELGATE_*` environment variables
/// 3. `--config` file
/// 4. Local config file (./modelgate.toml)
/// 5. Global config file (~/.modelgate/config.toml)
/// 6. Defaults
pub fn load_config(extra: Option<&Path>, overrides: &Overrides) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::discover_and_load()?;
    if let Some(path) = extra {
        let layer = PipelineConfig::load_from_file(path)?;
        config.merge(&layer);
    }
    config.merge_env();
    config.merge(&overrides.as_config());
    config.validate().context("invalid configuration")?;
    Ok(config)
}
