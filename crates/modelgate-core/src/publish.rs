//! Atomic, idempotent publication into the artifact store.
//!
//! A model is copied into a staging directory next to its final location,
//! flushed, and then moved into place with a single directory rename. Readers
//! see either no directory for the identity or a complete one.

use crate::error::{PipelineError, Result};
use crate::training::StagedArtifact;
use modelgate_training::layout::{METADATA_FILE, MODEL_FILE, STAGING_PREFIX};
use modelgate_training::{ArtifactIdentity, ArtifactMetadata, StoreLayout, read_metadata, sha256_file};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a publish left the artifact.
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub identity: ArtifactIdentity,
    pub location: PathBuf,
    pub metadata: ArtifactMetadata,
    /// An identical artifact was already published; nothing was written.
    pub already_present: bool,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    layout: StoreLayout,
}

impl ArtifactStore {
    #[must_use]
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Publish a staged artifact under its identity.
    ///
    /// Publishing the same bytes twice succeeds without touching the stored
    /// copy. Publishing different bytes under an existing identity fails with
    /// `ArtifactIdentityConflict` and leaves the stored copy as it was.
    pub fn publish(&self, staged: &StagedArtifact) -> Result<PublishOutcome> {
        let artifact = staged.artifact();
        let identity = &artifact.metadata.identity;
        let final_dir = self.layout.artifact_dir(identity);

        self.layout.ensure_namespace_dir().map_err(PipelineError::publish)?;

        if final_dir.exists() {
            return self.compare_existing(identity, &artifact.metadata);
        }

        let staging = tempfile::Builder::new()
            .prefix(&format!("{STAGING_PREFIX}{identity}-"))
            .tempdir_in(self.layout.namespace_dir())
            .map_err(PipelineError::publish)?;
        debug!(%identity, staging = %staging.path().display(), "staging artifact");

        write_staged_files(staging.path(), &artifact.path, &artifact.metadata)?;

        // Dropping `staging` after a successful rename finds nothing to remove.
        match std::fs::rename(staging.path(), &final_dir) {
            Ok(()) => {}
            Err(e) if final_dir.exists() => {
                debug!(%identity, error = %e, "identity published concurrently");
                return self.compare_existing(identity, &artifact.metadata);
            }
            Err(e) => {
                return Err(PipelineError::PublishFailed(format!(
                    "cannot move staged artifact to {}: {e}",
                    final_dir.display()
                )));
            }
        }
        sync_dir(&self.layout.namespace_dir());

        info!(%identity, location = %final_dir.display(), sha256 = %artifact.metadata.sha256, "artifact published");
        Ok(PublishOutcome {
            identity: identity.clone(),
            location: final_dir,
            metadata: artifact.metadata.clone(),
            already_present: false,
        })
    }

    fn compare_existing(&self, identity: &ArtifactIdentity, incoming: &ArtifactMetadata) -> Result<PublishOutcome> {
        let final_dir = self.layout.artifact_dir(identity);
        let metadata_path = self.layout.metadata_path(identity);
        if !metadata_path.exists() {
            return Err(PipelineError::PublishFailed(format!(
                "{} exists but has no {METADATA_FILE}",
                final_dir.display()
            )));
        }
        let existing = read_metadata(&metadata_path).map_err(PipelineError::publish)?;
        let stored_sha = sha256_file(&self.layout.model_path(identity)).map_err(PipelineError::publish)?;

        if stored_sha != incoming.sha256 {
            warn!(%identity, existing = %stored_sha, incoming = %incoming.sha256, "refusing to overwrite published artifact");
            return Err(PipelineError::ArtifactIdentityConflict {
                identity: identity.to_string(),
                existing: stored_sha,
                incoming: incoming.sha256.clone(),
            });
        }

        info!(%identity, location = %final_dir.display(), "identical artifact already published");
        Ok(PublishOutcome { identity: identity.clone(), location: final_dir, metadata: existing, already_present: true })
    }
}

fn write_staged_files(staging: &Path, model: &Path, metadata: &ArtifactMetadata) -> Result<()> {
    let model_dest = staging.join(MODEL_FILE);
    std::fs::copy(model, &model_dest).map_err(|e| {
        PipelineError::PublishFailed(format!("cannot copy {} into staging: {e}", model.display()))
    })?;
    File::open(&model_dest).and_then(|f| f.sync_all()).map_err(PipelineError::publish)?;

    let copied_sha = sha256_file(&model_dest).map_err(PipelineError::publish)?;
    if copied_sha != metadata.sha256 {
        return Err(PipelineError::PublishFailed(format!(
            "staged copy hash {copied_sha} does not match trained artifact {}",
            metadata.sha256
        )));
    }

    let json = serde_json::to_vec_pretty(metadata).map_err(PipelineError::publish)?;
    let mut file = File::create(staging.join(METADATA_FILE)).map_err(PipelineError::publish)?;
    file.write_all(&json).map_err(PipelineError::publish)?;
    file.sync_all().map_err(PipelineError::publish)?;
    Ok(())
}

/// Flush a directory entry so the rename survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|f| f.sync_all()) {
        warn!(dir = %dir.display(), error = %e, "failed to sync directory");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
