use crate::artifacts::ArtifactMetadata;
use crate::error::{TrainingError, TrainingResult};
use crate::job::ArtifactIdentity;
use crate::layout::{METADATA_FILE, MODEL_FILE, STAGING_PREFIX, StoreLayout};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A published model found in the artifact store.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedModelEntry {
    pub identity: ArtifactIdentity,
    pub model_path: PathBuf,
    pub metadata: ArtifactMetadata,
}

pub fn read_metadata(path: &Path) -> TrainingResult<ArtifactMetadata> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice::<ArtifactMetadata>(&bytes)?)
}

/// Discover published models by scanning `<root>/<namespace>/*/metadata.json`.
///
/// Staging directories and directories without metadata are skipped. Entries are
/// sorted oldest first.
pub fn discover_published_models(layout: &StoreLayout) -> TrainingResult<Vec<PublishedModelEntry>> {
    let mut out = Vec::new();

    let dir = match std::fs::read_dir(layout.namespace_dir()) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };

    for entry in dir {
        let entry = entry?;
        let artifact_dir = entry.path();
        if !artifact_dir.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(STAGING_PREFIX) {
            continue;
        }
        let metadata_path = artifact_dir.join(METADATA_FILE);
        if !metadata_path.exists() {
            continue;
        }
        let metadata = read_metadata(&metadata_path)?;
        out.push(PublishedModelEntry {
            identity: metadata.identity.clone(),
            model_path: artifact_dir.join(MODEL_FILE),
            metadata,
        });
    }

    out.sort_by(|a, b| {
        a.metadata
            .created_at
            .cmp(&b.metadata.created_at)
            .then_with(|| a.identity.as_str().cmp(b.identity.as_str()))
    });
    Ok(out)
}

/// Look up one published model. `Ok(None)` when nothing is published under `identity`.
pub fn resolve_published_model(
    layout: &StoreLayout,
    identity: &ArtifactIdentity,
) -> TrainingResult<Option<PublishedModelEntry>> {
    let metadata_path = layout.metadata_path(identity);
    if !metadata_path.exists() {
        return Ok(None);
    }
    let metadata = read_metadata(&metadata_path)?;
    if &metadata.identity != identity {
        return Err(TrainingError::Artifact(format!(
            "metadata at {} names identity {}",
            metadata_path.display(),
            metadata.identity
        )));
    }
    Ok(Some(PublishedModelEntry {
        identity: identity.clone(),
        model_path: layout.model_path(identity),
        metadata,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::RunId;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn publish_fixture(layout: &StoreLayout, id: &str, age_secs: i64) {
        let identity = ArtifactIdentity::parse(id).unwrap();
        std::fs::create_dir_all(layout.artifact_dir(&identity)).unwrap();
        std::fs::write(layout.model_path(&identity), b"model").unwrap();
        let metadata = ArtifactMetadata {
            identity: identity.clone(),
            run_id: RunId::for_commit(&identity),
            created_at: Utc::now() - Duration::seconds(age_secs),
            source_commit: id.to_string(),
            size_bytes: 5,
            sha256: "x".to_string(),
            dataset_fingerprint: None,
        };
        std::fs::write(
            layout.metadata_path(&identity),
            serde_json::to_vec_pretty(&metadata).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_discover_empty_store() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path().to_path_buf(), "cars").unwrap();
        assert!(discover_published_models(&layout).unwrap().is_empty());
    }

    #[test]
    fn test_discover_sorted_and_skips_staging() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path().to_path_buf(), "cars").unwrap();
        publish_fixture(&layout, "newer", 10);
        publish_fixture(&layout, "older", 100);
        std::fs::create_dir_all(layout.namespace_dir().join(".staging-abc")).unwrap();

        let found = discover_published_models(&layout).unwrap();
        let ids: Vec<_> = found.iter().map(|e| e.identity.as_str()).collect();
        assert_eq!(ids, vec!["older", "newer"]);
    }

    #[test]
    fn test_resolve_published_model() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path().to_path_buf(), "cars").unwrap();
        publish_fixture(&layout, "abc", 0);

        let abc = ArtifactIdentity::parse("abc").unwrap();
        let missing = ArtifactIdentity::parse("def").unwrap();
        assert!(resolve_published_model(&layout, &abc).unwrap().is_some());
        assert!(resolve_published_model(&layout, &missing).unwrap().is_none());
    }
}
