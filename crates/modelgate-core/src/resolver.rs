//! Resolves a logical dataset reference to a readable file.
//!
//! The data store is expected to be mounted already; the resolver only probes
//! existence and readability, waiting a bounded time for a lagging mount.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// A dataset location that was readable at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDataset {
    pub reference: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct DataSourceResolver {
    data_root: Option<PathBuf>,
    wait: Duration,
    poll_interval: Duration,
}

impl DataSourceResolver {
    #[must_use]
    pub fn new(data_root: Option<PathBuf>, wait: Duration, poll_interval: Duration) -> Self {
        Self { data_root, wait, poll_interval: poll_interval.max(Duration::from_millis(1)) }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.data_root.clone(), config.resolve_wait(), config.resolve_poll_interval())
    }

    /// Map a reference to a filesystem path without touching the filesystem.
    ///
    /// Accepted forms: absolute path, path relative to the data root (or the
    /// working directory when no root is configured), `file://` URL.
    pub fn locate(&self, reference: &str) -> Result<PathBuf> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(PipelineError::DataUnavailable("dataset reference is empty".to_string()));
        }

        let raw = if let Some(rest) = reference.strip_prefix("file://") {
            rest
        } else if let Some((scheme, _)) = reference.split_once("://") {
            return Err(PipelineError::DataUnavailable(format!(
                "unsupported scheme {scheme:?} in {reference}; mount the store and pass a path"
            )));
        } else {
            reference
        };

        let path = Path::new(raw);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        Ok(match &self.data_root {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        })
    }

    /// Resolve `reference`, retrying until it is readable or the wait elapses.
    pub async fn resolve(&self, reference: &str) -> Result<ResolvedDataset> {
        let path = self.locate(reference)?;
        let deadline = Instant::now() + self.wait;

        loop {
            match probe(&path).await {
                Ok(size_bytes) => {
                    info!(reference, path = %path.display(), size_bytes, "dataset resolved");
                    return Ok(ResolvedDataset { reference: reference.to_string(), path, size_bytes });
                }
                Err(reason) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PipelineError::DataUnavailable(format!(
                            "{} not readable after {:?}: {reason}",
                            path.display(),
                            self.wait
                        )));
                    }
                    debug!(path = %path.display(), %reason, "dataset not readable yet");
                    tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
                }
            }
        }
    }
}

/// Read-only existence and readability probe. Returns the file size.
async fn probe(path: &Path) -> std::result::Result<u64, String> {
    let md = tokio::fs::metadata(path).await.map_err(|e| e.to_string())?;
    if !md.is_file() {
        return Err("not a regular file".to_string());
    }
    tokio::fs::File::open(path).await.map_err(|e| e.to_string())?;
    Ok(md.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(root: Option<PathBuf>, wait_ms: u64) -> DataSourceResolver {
        DataSourceResolver::new(root, Duration::from_millis(wait_ms), Duration::from_millis(10))
    }

    #[test]
    fn test_locate_forms() {
        let r = resolver(Some(PathBuf::from("/mnt/data")), 0);
        assert_eq!(r.locate("cars.csv").unwrap(), PathBuf::from("/mnt/data/cars.csv"));
        assert_eq!(r.locate("/abs/cars.csv").unwrap(), PathBuf::from("/abs/cars.csv"));
        assert_eq!(r.locate("file:///abs/cars.csv").unwrap(), PathBuf::from("/abs/cars.csv"));
        assert!(r.locate("s3://bucket/cars.csv").is_err());
        assert!(r.locate("  ").is_err());
    }

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("cars.csv"), "price,year,mileage\n").unwrap();

        let r = resolver(Some(temp.path().to_path_buf()), 0);
        let resolved = r.resolve("cars.csv").await.unwrap();
        assert_eq!(resolved.path, temp.path().join("cars.csv"));
        assert_eq!(resolved.size_bytes, 19);
    }

    #[tokio::test]
    async fn test_resolve_missing_file_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let r = resolver(Some(temp.path().to_path_buf()), 30);
        let err = r.resolve("missing.csv").await.unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn test_resolve_directory_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let r = resolver(None, 0);
        let err = r.resolve(temp.path().to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[tokio::test]
    async fn test_resolve_waits_for_late_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("late.csv");
        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tokio::fs::write(writer_path, "price,year,mileage\n").await.unwrap();
        });

        let r = resolver(Some(temp.path().to_path_buf()), 5_000);
        let resolved = r.resolve("late.csv").await.unwrap();
        assert_eq!(resolved.path, path);
    }
}
