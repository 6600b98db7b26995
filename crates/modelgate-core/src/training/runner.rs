//! Bounded invocation of the opaque training step.

use crate::error::{PipelineError, Result};
use crate::resolver::ResolvedDataset;
use chrono::Utc;
use modelgate_training::{
    ArtifactIdentity, DatasetFingerprint, ModelArtifact, RunId, Trainer, TrainerOutcome, TrainingError,
    TrainingRequest, TrainingRun, make_artifact,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A trained model waiting in a private scratch directory.
///
/// Dropping it deletes the scratch directory and the model in it, so a run that
/// never reaches the publisher leaves nothing behind.
#[derive(Debug)]
pub struct StagedArtifact {
    artifact: ModelArtifact,
    scratch: TempDir,
}

impl StagedArtifact {
    #[must_use]
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }
}

/// What the runner hands back: the frozen run record and, on success, the
/// staged artifact.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub run: TrainingRun,
    pub staged: Result<StagedArtifact>,
}

enum Interrupted {
    Cancelled,
    TimedOut(Duration),
}

pub struct TrainingRunner {
    trainer: Arc<dyn Trainer>,
    work_dir: PathBuf,
}

impl TrainingRunner {
    #[must_use]
    pub fn new(trainer: Arc<dyn Trainer>, work_dir: PathBuf) -> Self {
        Self { trainer, work_dir }
    }

    #[must_use]
    pub fn trainer_id(&self) -> &'static str {
        self.trainer.id()
    }

    /// Run the trainer once.
    ///
    /// The destination is `<scratch>/<run_id>.model` inside a fresh directory
    /// under the work dir. On failure, timeout or cancellation the trainer
    /// future is dropped (external processes are killed) and the scratch
    /// directory is removed before returning.
    pub async fn run(
        &self,
        identity: &ArtifactIdentity,
        dataset: &ResolvedDataset,
        fingerprint: Option<DatasetFingerprint>,
        max_duration: Option<Duration>,
        cancel: &CancellationToken,
    ) -> TrainingOutcome {
        let run_id = RunId::for_commit(identity);
        let scratch = match self.scratch_dir(&run_id) {
            Ok(dir) => dir,
            Err(e) => {
                let run = TrainingRun::pending(run_id, dataset.path.clone(), fingerprint, self.work_dir.clone());
                let now = Utc::now();
                let reason = format!("cannot create scratch directory in {}: {e}", self.work_dir.display());
                return TrainingOutcome {
                    run: run.started(now).failed(now, 0, reason.clone()),
                    staged: Err(PipelineError::TrainingFailed(reason)),
                };
            }
        };

        let output_path = scratch.path().join(format!("{run_id}.model"));
        let request = TrainingRequest {
            run_id: run_id.clone(),
            dataset_path: dataset.path.clone(),
            output_path: output_path.clone(),
        };
        let run = TrainingRun::pending(run_id.clone(), dataset.path.clone(), fingerprint.clone(), output_path.clone())
            .started(Utc::now());

        info!(%run_id, trainer = self.trainer.id(), output = %output_path.display(), ?max_duration, "training started");
        let started = Instant::now();

        let train = self.trainer.train(&request);
        let bounded = async {
            match max_duration {
                Some(limit) => tokio::time::timeout(limit, train).await.map_err(|_| Interrupted::TimedOut(limit)),
                None => Ok(train.await),
            }
        };
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Interrupted::Cancelled),
            r = bounded => r,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let finished = Utc::now();

        let mut reported = TrainerOutcome::default();
        let staged = match result {
            Err(Interrupted::Cancelled) => Err(PipelineError::Cancelled),
            Err(Interrupted::TimedOut(limit)) => Err(PipelineError::TrainingTimeout(limit)),
            Ok(Err(e)) => {
                if let TrainingError::TrainerExited { exit_code, log_tail, .. } = &e {
                    reported.exit_code = *exit_code;
                    reported.log_tail = (!log_tail.is_empty()).then(|| log_tail.clone());
                }
                Err(PipelineError::TrainingFailed(e.to_string()))
            }
            Ok(Ok(outcome)) => {
                let artifact = make_artifact(identity, &run_id, output_path.clone(), fingerprint)
                    .map_err(|e| PipelineError::TrainingFailed(format!("trainer reported success but {e}")));
                if let Ok(artifact) = &artifact {
                    info!(%run_id, exit_code = ?outcome.exit_code, sha256 = %artifact.metadata.sha256, "training produced artifact");
                }
                reported = outcome;
                artifact
            }
        };

        let run = run.with_trainer_outcome(reported);
        match staged {
            Ok(artifact) => TrainingOutcome {
                run: run.succeeded(finished, elapsed_ms),
                staged: Ok(StagedArtifact { artifact, scratch }),
            },
            Err(err) => {
                warn!(%run_id, error = %err, elapsed_ms, "training did not produce a usable artifact");
                discard(scratch, &output_path);
                TrainingOutcome { run: run.failed(finished, elapsed_ms, err.to_string()), staged: Err(err) }
            }
        }
    }

    fn scratch_dir(&self, run_id: &RunId) -> std::io::Result<TempDir> {
        std::fs::create_dir_all(&self.work_dir)?;
        tempfile::Builder::new()
            .prefix(&format!("modelgate-{run_id}-"))
            .tempdir_in(&self.work_dir)
    }
}

/// Remove a partial artifact and its scratch directory. Errors are logged, the
/// run has already failed.
fn discard(scratch: TempDir, output_path: &Path) {
    let dir = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(dir = %dir.display(), error = %e, "failed to remove scratch directory");
        if output_path.exists()
            && let Err(e) = std::fs::remove_file(output_path)
        {
            warn!(path = %output_path.display(), error = %e, "failed to remove partial artifact");
        }
    }
}
