use crate::dataset::DatasetFingerprint;
use crate::error::{TrainingError, TrainingResult};
use crate::job::{ArtifactIdentity, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Metadata stored next to every published model blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub identity: ArtifactIdentity,
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub source_commit: String,
    pub size_bytes: u64,
    pub sha256: String,
    #[serde(default)]
    pub dataset_fingerprint: Option<DatasetFingerprint>,
}

/// A serialized model produced by a trainer, not yet published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub path: PathBuf,
    pub metadata: ArtifactMetadata,
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn fingerprint_dataset(path: &Path) -> TrainingResult<DatasetFingerprint> {
    Ok(DatasetFingerprint(sha256_file(path)?))
}

/// Describe the model file a trainer left at `path`.
///
/// Fails if the file is missing or empty: a trainer that "succeeds" without
/// output has not produced an artifact.
pub fn make_artifact(
    identity: &ArtifactIdentity,
    run_id: &RunId,
    path: PathBuf,
    dataset_fingerprint: Option<DatasetFingerprint>,
) -> TrainingResult<ModelArtifact> {
    let md = match std::fs::metadata(&path) {
        Ok(md) => md,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TrainingError::Artifact(format!(
                "artifact path does not exist: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    if !md.is_file() {
        return Err(TrainingError::Artifact(format!("artifact is not a file: {}", path.display())));
    }
    if md.len() == 0 {
        return Err(TrainingError::Artifact(format!("artifact is empty: {}", path.display())));
    }

    let sha256 = sha256_file(&path)?;
    Ok(ModelArtifact {
        metadata: ArtifactMetadata {
            identity: identity.clone(),
            run_id: run_id.clone(),
            created_at: Utc::now(),
            source_commit: identity.as_str().to_string(),
            size_bytes: md.len(),
            sha256,
            dataset_fingerprint,
        },
        path,
    })
}
