//! Pipeline configuration file support.
//!
//! Provides the configuration structure and its layered loading. The loaded
//! value is handed explicitly to every component; nothing here writes to the
//! process environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_NAMESPACE: &str = "car-price";
pub const DEFAULT_MIN_ROWS: usize = 10_000;
pub const DEFAULT_MIN_YEAR: i32 = 1950;
pub const DEFAULT_SAMPLE_ROWS: usize = 5;
pub const DEFAULT_RESOLVE_WAIT_SECS: u64 = 30;
pub const DEFAULT_RESOLVE_POLL_MILLIS: u64 = 500;

/// Which implementation backs the training step or the inference runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process linear price model.
    #[default]
    Builtin,
    /// External command.
    Process,
}

/// Backend selection for `[trainer]` and `[runtime]`.
///
/// For `process` backends `command` is required. `args` may contain
/// placeholders: `{data}`, `{output}`, `{run_id}` for the trainer and
/// `{model}`, `{input}` for the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: Option<BackendKind>,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}

impl BackendConfig {
    fn merge(&mut self, other: &Self) {
        if other.kind.is_some() {
            self.kind = other.kind;
        }
        if let Some(ref command) = other.command {
            self.command = Some(command.clone());
        }
        if !other.args.is_empty() {
            self.args = other.args.clone();
        }
    }
}

/// Optional comparison against a previously published artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Identity of the published artifact to compare against.
    #[serde(default)]
    pub identity: Option<String>,

    /// Largest tolerated relative increase of mean absolute error (0.1 = 10%).
    #[serde(default)]
    pub max_relative_regression: Option<f64>,
}

/// Pipeline configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root directory of the durable artifact store
    #[serde(default)]
    pub store_root: Option<PathBuf>,

    /// Default artifact namespace under the store root
    #[serde(default)]
    pub namespace: Option<String>,

    /// Scratch directory for in-flight training output
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Base directory for relative dataset references (the mounted data store)
    #[serde(default)]
    pub data_root: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,

    /// Default training time limit
    #[serde(default)]
    pub max_training_secs: Option<u64>,

    /// How long the resolver waits for a dataset to become readable
    #[serde(default)]
    pub resolve_wait_secs: Option<u64>,

    #[serde(default)]
    pub resolve_poll_millis: Option<u64>,

    /// Row count must be strictly greater than this
    #[serde(default)]
    pub min_rows: Option<usize>,

    /// Years must be strictly greater than this
    #[serde(default)]
    pub min_year: Option<i32>,

    /// Rows used for sanity inference
    #[serde(default)]
    pub sample_rows: Option<usize>,

    #[serde(default)]
    pub trainer: BackendConfig,

    #[serde(default)]
    pub runtime: BackendConfig,

    #[serde(default)]
    pub baseline: BaselineConfig,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".modelgate")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("modelgate.toml")
    }

    /// Discover and load configuration files.
    ///
    /// Loads configuration from:
    /// 1. Global config (~/.modelgate/config.toml)
    /// 2. Local config (./modelgate.toml)
    ///
    /// Local config overrides global config. A file that exists but does not
    /// parse is an error; a missing file is not.
    pub fn discover_and_load() -> ConfigResult<Self> {
        let mut config = Self::default();

        for path in [Self::default_global_path(), Self::default_local_path()] {
            match Self::load_from_file(&path) {
                Ok(layer) => config.merge(&layer),
                Err(ConfigError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(config)
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &Self) {
        if let Some(ref v) = other.store_root {
            self.store_root = Some(v.clone());
        }
        if let Some(ref v) = other.namespace {
            self.namespace = Some(v.clone());
        }
        if let Some(ref v) = other.work_dir {
            self.work_dir = Some(v.clone());
        }
        if let Some(ref v) = other.data_root {
            self.data_root = Some(v.clone());
        }
        if let Some(ref v) = other.log_level {
            self.log_level = Some(v.clone());
        }
        if other.max_training_secs.is_some() {
            self.max_training_secs = other.max_training_secs;
        }
        if other.resolve_wait_secs.is_some() {
            self.resolve_wait_secs = other.resolve_wait_secs;
        }
        if other.resolve_poll_millis.is_some() {
            self.resolve_poll_millis = other.resolve_poll_millis;
        }
        if other.min_rows.is_some() {
            self.min_rows = other.min_rows;
        }
        if other.min_year.is_some() {
            self.min_year = other.min_year;
        }
        if other.sample_rows.is_some() {
            self.sample_rows = other.sample_rows;
        }
        self.trainer.merge(&other.trainer);
        self.runtime.merge(&other.runtime);
        if let Some(ref v) = other.baseline.identity {
            self.baseline.identity = Some(v.clone());
        }
        if other.baseline.max_relative_regression.is_some() {
            self.baseline.max_relative_regression = other.baseline.max_relative_regression;
        }
    }

    /// Overlay `MODELGATE_*` environment variables.
    pub fn merge_env(&mut self) {
        self.merge_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay variables from an arbitrary lookup (testable form of [`Self::merge_env`]).
    pub fn merge_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MODELGATE_STORE_ROOT") {
            self.store_root = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MODELGATE_NAMESPACE") {
            self.namespace = Some(v);
        }
        if let Some(v) = lookup("MODELGATE_WORK_DIR") {
            self.work_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MODELGATE_DATA_ROOT") {
            self.data_root = Some(PathBuf::from(v));
        }
    }

    /// Check values that are representable in TOML but meaningless.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sample_rows == Some(0) {
            return Err(ConfigError::InvalidValue("sample_rows must be >= 1".to_string()));
        }
        if self.resolve_poll_millis == Some(0) {
            return Err(ConfigError::InvalidValue("resolve_poll_millis must be >= 1".to_string()));
        }
        if self.max_training_secs == Some(0) {
            return Err(ConfigError::InvalidValue("max_training_secs must be >= 1".to_string()));
        }
        for (section, backend) in [("trainer", &self.trainer), ("runtime", &self.runtime)] {
            if backend.kind == Some(BackendKind::Process)
                && backend.command.as_deref().is_none_or(|c| c.trim().is_empty())
            {
                return Err(ConfigError::InvalidValue(format!(
                    "[{section}] kind = \"process\" requires a command"
                )));
            }
        }
        match (&self.baseline.identity, self.baseline.max_relative_regression) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::InvalidValue(
                    "[baseline] needs both identity and max_relative_regression".to_string(),
                ));
            }
            (Some(_), Some(t)) if !t.is_finite() || t < 0.0 => {
                return Err(ConfigError::InvalidValue(
                    "[baseline] max_relative_regression must be a non-negative number".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn store_root(&self) -> PathBuf {
        self.store_root.clone().unwrap_or_else(|| PathBuf::from("artifacts"))
    }

    pub fn namespace(&self) -> String {
        self.namespace.clone().unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn max_training_duration(&self) -> Option<Duration> {
        self.max_training_secs.map(Duration::from_secs)
    }

    pub fn resolve_wait(&self) -> Duration {
        Duration::from_secs(self.resolve_wait_secs.unwrap_or(DEFAULT_RESOLVE_WAIT_SECS))
    }

    pub fn resolve_poll_interval(&self) -> Duration {
        Duration::from_millis(self.resolve_poll_millis.unwrap_or(DEFAULT_RESOLVE_POLL_MILLIS))
    }

    pub fn min_rows(&self) -> usize {
        self.min_rows.unwrap_or(DEFAULT_MIN_ROWS)
    }

    pub fn min_year(&self) -> i32 {
        self.min_year.unwrap_or(DEFAULT_MIN_YEAR)
    }

    pub fn sample_rows(&self) -> usize {
        self.sample_rows.unwrap_or(DEFAULT_SAMPLE_ROWS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("modelgate.toml");

        let config_content = r#"
store_root = "/srv/models"
namespace = "used-cars"
max_training_secs = 900
min_rows = 500

[trainer]
kind = "process"
command = "python"
args = ["train.py", "{data}", "{output}"]

[baseline]
identity = "prod-2024-06"
max_relative_regression = 0.05
"#;

        std::fs::write(&config_path, config_content).unwrap();

        let config = PipelineConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.store_root(), PathBuf::from("/srv/models"));
        assert_eq!(config.namespace(), "used-cars");
        assert_eq!(config.max_training_duration(), Some(Duration::from_secs(900)));
        assert_eq!(config.min_rows(), 500);
        assert_eq!(config.trainer.kind, Some(BackendKind::Process));
        assert_eq!(config.trainer.args, vec!["train.py", "{data}", "{output}"]);
        assert_eq!(config.baseline.max_relative_regression, Some(0.05));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.namespace(), DEFAULT_NAMESPACE);
        assert_eq!(config.min_rows(), 10_000);
        assert_eq!(config.min_year(), 1950);
        assert_eq!(config.sample_rows(), 5);
        assert_eq!(config.max_training_duration(), None);
    }

    #[test]
    fn test_merge() {
        let mut global = PipelineConfig {
            namespace: Some("global".to_string()),
            min_rows: Some(100),
            ..Default::default()
        };

        let local = PipelineConfig {
            namespace: Some("local".to_string()),
            trainer: BackendConfig { command: Some("./train.sh".to_string()), ..Default::default() },
            ..Default::default()
        };

        global.merge(&local);
        assert_eq!(global.namespace(), "local");
        assert_eq!(global.min_rows(), 100);
        assert_eq!(global.trainer.command.as_deref(), Some("./train.sh"));
    }

    #[test]
    fn test_merge_env_with() {
        let mut config = PipelineConfig::default();
        config.merge_env_with(|key| match key {
            "MODELGATE_STORE_ROOT" => Some("/mnt/store".to_string()),
            "MODELGATE_NAMESPACE" => Some("ns".to_string()),
            _ => None,
        });
        assert_eq!(config.store_root(), PathBuf::from("/mnt/store"));
        assert_eq!(config.namespace(), "ns");
        assert!(config.data_root.is_none());
    }

    #[test]
    fn test_validate_rejects_incomplete_sections() {
        let config = PipelineConfig {
            trainer: BackendConfig { kind: Some(BackendKind::Process), ..Default::default() },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            baseline: BaselineConfig { identity: Some("x".to_string()), max_relative_regression: None },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            baseline: BaselineConfig {
                identity: Some("x".to_string()),
                max_relative_regression: Some(-1.0),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "min_rows = \"many\"").unwrap();
        assert!(matches!(PipelineConfig::load_from_file(&path), Err(ConfigError::ParseError(_))));
    }
}
