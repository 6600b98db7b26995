use crate::error::{TrainingError, TrainingResult};
use crate::job::ArtifactIdentity;
use std::path::{Path, PathBuf};

pub const MODEL_FILE: &str = "model.bin";
pub const METADATA_FILE: &str = "metadata.json";
pub const STAGING_PREFIX: &str = ".staging-";

/// Filesystem layout of the durable artifact store.
///
/// Published models live under `<root>/<namespace>/<identity>/{model.bin,metadata.json}`.
/// Staging directories are siblings of the identity directories (same filesystem,
/// so the final rename is atomic) and start with `.staging-`.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
    namespace: String,
}

impl StoreLayout {
    pub fn new(root: PathBuf, namespace: &str) -> TrainingResult<Self> {
        // Same character rules as an identity: the namespace is one path segment.
        let namespace = ArtifactIdentity::parse(namespace)
            .map_err(|_| TrainingError::InvalidSpec(format!("invalid artifact namespace: {namespace:?}")))?;
        Ok(Self { root, namespace: namespace.as_str().to_string() })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn namespace_dir(&self) -> PathBuf {
        self.root.join(&self.namespace)
    }

    #[must_use]
    pub fn artifact_dir(&self, identity: &ArtifactIdentity) -> PathBuf {
        self.namespace_dir().join(identity.as_str())
    }

    #[must_use]
    pub fn model_path(&self, identity: &ArtifactIdentity) -> PathBuf {
        self.artifact_dir(identity).join(MODEL_FILE)
    }

    #[must_use]
    pub fn metadata_path(&self, identity: &ArtifactIdentity) -> PathBuf {
        self.artifact_dir(identity).join(METADATA_FILE)
    }

    pub fn ensure_namespace_dir(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(self.namespace_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path().to_path_buf(), "car-price").unwrap();
        let id = ArtifactIdentity::parse("abc123").unwrap();

        assert_eq!(layout.namespace_dir(), temp.path().join("car-price"));
        assert_eq!(layout.model_path(&id), temp.path().join("car-price/abc123/model.bin"));
        assert_eq!(layout.metadata_path(&id), temp.path().join("car-price/abc123/metadata.json"));
    }

    #[test]
    fn test_layout_rejects_bad_namespace() {
        assert!(StoreLayout::new(PathBuf::from("/tmp"), "../escape").is_err());
        assert!(StoreLayout::new(PathBuf::from("/tmp"), "").is_err());
    }
}
