//! Sequences the stages of a run and enforces the gates between them.
//!
//! Each stage is attempted once. A failing gate ends the run and nothing
//! downstream of it executes.

use super::request::PipelineRequest;
use super::result::{PipelineResult, PipelineStatus, PublishedArtifact};
use super::state::PipelineState;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::publish::ArtifactStore;
use crate::resolver::{DataSourceResolver, ResolvedDataset};
use crate::training::{TrainingRunner, runtime_from_config, trainer_from_config};
use crate::validation::{BaselineRegressionCheck, DataValidator, ModelValidator, ValidationReport};
use chrono::{DateTime, Utc};
use modelgate_training::{
    ArtifactIdentity, CarRecord, DatasetFingerprint, ModelRuntime, ProgressEvent, ProgressSink, RunId, StoreLayout,
    Trainer, TracingProgressSink, TrainingRun, fingerprint_dataset, load_dataset,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct Pipeline {
    resolver: DataSourceResolver,
    data_validator: DataValidator,
    runner: TrainingRunner,
    model_validator: ModelValidator,
    store_root: PathBuf,
    max_training_duration: Option<Duration>,
    progress: Arc<dyn ProgressSink>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        trainer: Arc<dyn Trainer>,
        runtime: Arc<dyn ModelRuntime>,
        store_root: PathBuf,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            resolver: DataSourceResolver::new(None, Duration::ZERO, Duration::from_millis(100)),
            data_validator: DataValidator::new(),
            runner: TrainingRunner::new(trainer, work_dir),
            model_validator: ModelValidator::new(runtime),
            store_root,
            max_training_duration: None,
            progress: Arc::new(TracingProgressSink),
        }
    }

    /// Assemble a pipeline from configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate().map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;

        let trainer = trainer_from_config(&config.trainer)?;
        let runtime = runtime_from_config(&config.runtime)?;
        let mut model_validator = ModelValidator::new(runtime.clone()).with_sample_rows(config.sample_rows());
        if let (Some(identity), Some(threshold)) =
            (&config.baseline.identity, config.baseline.max_relative_regression)
        {
            let identity = ArtifactIdentity::parse(identity)
                .map_err(|e| PipelineError::InvalidRequest(format!("baseline identity: {e}")))?;
            model_validator = model_validator.with_check(Arc::new(BaselineRegressionCheck::new(identity, threshold)?));
        }

        Ok(Self::new(trainer, runtime, config.store_root(), config.work_dir())
            .with_resolver(DataSourceResolver::from_config(config))
            .with_data_validator(DataValidator::from_config(config))
            .with_model_validator(model_validator)
            .with_max_training_duration(config.max_training_duration()))
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: DataSourceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_data_validator(mut self, validator: DataValidator) -> Self {
        self.data_validator = validator;
        self
    }

    #[must_use]
    pub fn with_model_validator(mut self, validator: ModelValidator) -> Self {
        self.model_validator = validator;
        self
    }

    /// Default training limit for requests that do not carry their own.
    #[must_use]
    pub fn with_max_training_duration(mut self, limit: Option<Duration>) -> Self {
        self.max_training_duration = limit;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Run the full pipeline for one trigger. Never panics on stage failure;
    /// every outcome is a `PipelineResult`.
    pub async fn run(&self, request: &PipelineRequest, cancel: &CancellationToken) -> PipelineResult {
        let mut rec = RunRecorder::start(RunId(request.commit_id.trim().to_string()), self.progress.as_ref());
        info!(
            run_id = %rec.run_id,
            dataset = %request.dataset_reference,
            namespace = %request.namespace,
            trainer = self.runner.trainer_id(),
            "pipeline run requested"
        );
        let outcome = self.execute(request, cancel, &mut rec).await;
        rec.finish(outcome.map(Some))
    }

    /// Resolve and validate a dataset without training anything.
    pub async fn check_data(&self, reference: &str, cancel: &CancellationToken) -> PipelineResult {
        let mut rec = RunRecorder::start(RunId("check-data".to_string()), self.progress.as_ref());
        let outcome: Result<Option<PublishedArtifact>> = async {
            rec.enter(PipelineState::Resolving);
            let resolved = cancellable(cancel, self.resolver.resolve(reference)).await?;
            self.validate_data(&resolved, cancel, &mut rec).await.map(|_| None)
        }
        .await;
        rec.finish(outcome)
    }

    async fn execute(
        &self,
        request: &PipelineRequest,
        cancel: &CancellationToken,
        rec: &mut RunRecorder<'_>,
    ) -> Result<PublishedArtifact> {
        let identity = ArtifactIdentity::parse(&request.commit_id)
            .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;
        let layout = StoreLayout::new(self.store_root.clone(), &request.namespace)
            .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;

        rec.enter(PipelineState::Resolving);
        let resolved = cancellable(cancel, self.resolver.resolve(&request.dataset_reference)).await?;

        let (records, fingerprint) = self.validate_data(&resolved, cancel, rec).await?;

        rec.enter(PipelineState::Training);
        let max_duration = request.max_training_duration.or(self.max_training_duration);
        let outcome = self.runner.run(&identity, &resolved, Some(fingerprint), max_duration, cancel).await;
        rec.training_run = Some(outcome.run);
        let staged = outcome.staged?;

        rec.enter(PipelineState::ValidatingModel);
        let validation = cancellable(cancel, async {
            Ok(self.model_validator.validate(staged.artifact(), &records, &layout).await)
        })
        .await?;
        let (report, verdict) = validation.into_verdict();
        rec.record_report(report);
        verdict?;

        // Publishing is not interrupted once started; a run cancelled before
        // this point publishes nothing.
        rec.enter(PipelineState::Publishing);
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let store = ArtifactStore::new(layout);
        let published = tokio::task::spawn_blocking(move || store.publish(&staged))
            .await
            .map_err(|e| PipelineError::PublishFailed(format!("publish task failed: {e}")))??;
        Ok(published.into())
    }

    /// Load the dataset and run the data gate. The report is recorded whether
    /// or not it passes.
    async fn validate_data(
        &self,
        resolved: &ResolvedDataset,
        cancel: &CancellationToken,
        rec: &mut RunRecorder<'_>,
    ) -> Result<(Vec<CarRecord>, DatasetFingerprint)> {
        rec.enter(PipelineState::ValidatingData);
        let path = resolved.path.clone();
        let task = tokio::task::spawn_blocking(move || -> modelgate_training::TrainingResult<_> {
            let records = load_dataset(&path)?;
            let fingerprint = fingerprint_dataset(&path)?;
            Ok((records, fingerprint))
        });
        let load = async move {
            match task.await {
                Ok(loaded) => loaded.map_err(|e| PipelineError::DataUnavailable(e.to_string())),
                Err(e) => Err(PipelineError::DataUnavailable(format!("dataset load task failed: {e}"))),
            }
        };
        let (records, fingerprint) = cancellable(cancel, load).await?;

        let report = self.data_validator.validate(&records);
        let verdict = if report.passed() { Ok(()) } else { Err(PipelineError::DataGateFailed(report.summary())) };
        rec.record_report(report);
        verdict?;
        Ok((records, fingerprint))
    }
}

/// Race a stage against cancellation.
async fn cancellable<T>(cancel: &CancellationToken, stage: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(PipelineError::Cancelled),
        r = stage => r,
    }
}

/// Accumulates the observable record of a run as stages complete.
struct RunRecorder<'a> {
    run_id: RunId,
    progress: &'a dyn ProgressSink,
    transitions: Vec<PipelineState>,
    data_report: Option<ValidationReport>,
    training_run: Option<TrainingRun>,
    model_report: Option<ValidationReport>,
    started_at: DateTime<Utc>,
}

impl<'a> RunRecorder<'a> {
    fn start(run_id: RunId, progress: &'a dyn ProgressSink) -> Self {
        progress.on_event(ProgressEvent::Started { run_id: run_id.clone() });
        Self {
            run_id,
            progress,
            transitions: vec![PipelineState::Idle],
            data_report: None,
            training_run: None,
            model_report: None,
            started_at: Utc::now(),
        }
    }

    fn current(&self) -> PipelineState {
        self.transitions.last().copied().unwrap_or(PipelineState::Idle)
    }

    fn enter(&mut self, state: PipelineState) {
        self.close_stage(true);
        self.transitions.push(state);
        self.progress.on_event(ProgressEvent::StageStarted { run_id: self.run_id.clone(), stage: state.to_string() });
    }

    fn close_stage(&self, ok: bool) {
        let stage = self.current();
        if stage != PipelineState::Idle {
            self.progress.on_event(ProgressEvent::StageFinished {
                run_id: self.run_id.clone(),
                stage: stage.to_string(),
                ok,
            });
        }
    }

    fn record_report(&mut self, report: ValidationReport) {
        for check in report.checks() {
            self.progress.on_event(ProgressEvent::CheckEvaluated {
                run_id: self.run_id.clone(),
                check: check.check_name.clone(),
                passed: check.passed,
                message: check.message.clone(),
            });
        }
        match report.kind() {
            crate::validation::ReportKind::Data => self.data_report = Some(report),
            crate::validation::ReportKind::Model => self.model_report = Some(report),
        }
    }

    fn finish(mut self, outcome: Result<Option<PublishedArtifact>>) -> PipelineResult {
        let (status, published) = match outcome {
            Ok(published) => {
                self.close_stage(true);
                self.transitions.push(PipelineState::Succeeded);
                (PipelineStatus::Succeeded, published)
            }
            Err(err) => {
                let stage = self.current();
                self.close_stage(false);
                error!(run_id = %self.run_id, %stage, kind = %err.kind(), error = %err, "pipeline failed");
                self.transitions.push(PipelineState::Failed);
                (PipelineStatus::Failed { stage, kind: err.kind(), message: err.to_string() }, None)
            }
        };
        let succeeded = matches!(status, PipelineStatus::Succeeded);
        self.progress.on_event(ProgressEvent::Finished { run_id: self.run_id.clone(), succeeded });

        PipelineResult {
            run_id: self.run_id,
            status,
            transitions: self.transitions,
            data_report: self.data_report,
            training_run: self.training_run,
            model_report: self.model_report,
            published,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
