//! Model health gate.
//!
//! The built-in checks reload the freshly trained artifact and run inference on
//! a few sample rows. Additional checks plug in through [`ModelCheck`];
//! [`BaselineRegressionCheck`] is the one shipped here.

use super::report::{CheckResult, ReportKind, ValidationReport};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use modelgate_training::{
    ArtifactIdentity, CarRecord, LoadedModel, ModelArtifact, ModelRuntime, StoreLayout,
    resolve_published_model,
};
use std::sync::Arc;
use tracing::{debug, warn};

pub const MODEL_LOADS: &str = "model_loads";
pub const SAMPLE_PREDICTION: &str = "sample_prediction";
pub const BASELINE_REGRESSION: &str = "baseline_regression";

/// Everything an extra check may look at. Only built for a healthy model.
pub struct ModelCheckContext<'a> {
    pub artifact: &'a ModelArtifact,
    pub model: &'a dyn LoadedModel,
    pub runtime: &'a dyn ModelRuntime,
    /// Well-formed rows used for sanity inference.
    pub samples: &'a [CarRecord],
    /// Candidate predictions for `samples`, same order.
    pub predictions: &'a [f64],
    /// Store the candidate would be published to.
    pub layout: &'a StoreLayout,
}

/// An additional model-quality check.
#[async_trait]
pub trait ModelCheck: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(&self, ctx: &ModelCheckContext<'_>) -> CheckResult;
}

/// Result of model validation.
#[derive(Debug, Clone)]
pub struct ModelValidation {
    pub report: ValidationReport,
    /// The model loaded and produced predictions. When false the failure is
    /// `ModelUnhealthy`; a healthy model with a failing report is `ModelGateFailed`.
    pub healthy: bool,
}

impl ModelValidation {
    pub fn into_verdict(self) -> (ValidationReport, Result<()>) {
        let verdict = if !self.healthy {
            Err(PipelineError::ModelUnhealthy(self.report.summary()))
        } else if !self.report.passed() {
            Err(PipelineError::ModelGateFailed(self.report.summary()))
        } else {
            Ok(())
        };
        (self.report, verdict)
    }
}

pub struct ModelValidator {
    runtime: Arc<dyn ModelRuntime>,
    sample_rows: usize,
    checks: Vec<Arc<dyn ModelCheck>>,
}

impl ModelValidator {
    #[must_use]
    pub fn new(runtime: Arc<dyn ModelRuntime>) -> Self {
        Self { runtime, sample_rows: crate::config::pipeline_config::DEFAULT_SAMPLE_ROWS, checks: Vec::new() }
    }

    #[must_use]
    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows.max(1);
        self
    }

    #[must_use]
    pub fn with_check(mut self, check: Arc<dyn ModelCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub async fn validate(
        &self,
        artifact: &ModelArtifact,
        dataset: &[CarRecord],
        layout: &StoreLayout,
    ) -> ModelValidation {
        let samples: Vec<CarRecord> = dataset
            .iter()
            .filter(|r| r.is_well_formed())
            .take(self.sample_rows)
            .cloned()
            .collect();

        let mut checks = Vec::with_capacity(2 + self.checks.len());

        let model = match self.runtime.load(&artifact.path).await {
            Ok(model) => {
                checks.push(CheckResult::pass(
                    MODEL_LOADS,
                    format!("{} loaded {} bytes", self.runtime.id(), artifact.metadata.size_bytes),
                ));
                Some(model)
            }
            Err(e) => {
                warn!(error = %e, path = %artifact.path.display(), "model failed to load");
                checks.push(CheckResult::fail(MODEL_LOADS, e.to_string()));
                None
            }
        };

        let predictions = match &model {
            None => {
                checks.push(CheckResult::fail(SAMPLE_PREDICTION, "skipped: model did not load"));
                None
            }
            Some(model) => {
                let (check, predictions) = sample_prediction(model.as_ref(), &samples).await;
                checks.push(check);
                predictions
            }
        };

        let healthy = predictions.is_some();
        match (model, predictions) {
            (Some(model), Some(predictions)) => {
                let ctx = ModelCheckContext {
                    artifact,
                    model: model.as_ref(),
                    runtime: self.runtime.as_ref(),
                    samples: &samples,
                    predictions: &predictions,
                    layout,
                };
                for check in &self.checks {
                    checks.push(check.evaluate(&ctx).await);
                }
            }
            _ => {
                for check in &self.checks {
                    checks.push(CheckResult::fail(check.name(), "skipped: model is not healthy"));
                }
            }
        }

        let report = ValidationReport::new(ReportKind::Model, checks);
        debug!(healthy, passed = report.passed(), "model validation finished");
        ModelValidation { report, healthy }
    }
}

async fn sample_prediction(model: &dyn LoadedModel, samples: &[CarRecord]) -> (CheckResult, Option<Vec<f64>>) {
    if samples.is_empty() {
        return (CheckResult::fail(SAMPLE_PREDICTION, "no well-formed sample rows to predict on"), None);
    }
    match model.predict(samples).await {
        Ok(predictions) if predictions.len() != samples.len() => (
            CheckResult::fail(
                SAMPLE_PREDICTION,
                format!("expected {} predictions, got {}", samples.len(), predictions.len()),
            ),
            None,
        ),
        Ok(predictions) => {
            if let Some((i, p)) = predictions.iter().enumerate().find(|(_, p)| !p.is_finite()) {
                return (
                    CheckResult::fail(
                        SAMPLE_PREDICTION,
                        format!("prediction for line {} is not finite: {p}", samples[i].line),
                    ),
                    None,
                );
            }
            let check = CheckResult::pass(
                SAMPLE_PREDICTION,
                format!("predicted {} sample rows (first: {:.2})", predictions.len(), predictions[0]),
            );
            (check, Some(predictions))
        }
        Err(e) => (CheckResult::fail(SAMPLE_PREDICTION, e.to_string()), None),
    }
}

/// Compares the candidate against a previously published artifact.
///
/// Passes when nothing is published under the baseline identity. Fails when the
/// candidate's mean absolute error on the sample rows exceeds the baseline's by
/// more than `max_relative_regression` (0.1 = 10%).
pub struct BaselineRegressionCheck {
    baseline: ArtifactIdentity,
    max_relative_regression: f64,
}

impl BaselineRegressionCheck {
    pub fn new(baseline: ArtifactIdentity, max_relative_regression: f64) -> Result<Self> {
        if !max_relative_regression.is_finite() || max_relative_regression < 0.0 {
            return Err(PipelineError::InvalidRequest(format!(
                "max_relative_regression must be a non-negative number, got {max_relative_regression}"
            )));
        }
        Ok(Self { baseline, max_relative_regression })
    }
}

#[async_trait]
impl ModelCheck for BaselineRegressionCheck {
    fn name(&self) -> &str {
        BASELINE_REGRESSION
    }

    async fn evaluate(&self, ctx: &ModelCheckContext<'_>) -> CheckResult {
        let layout = ctx.layout.clone();
        let baseline = self.baseline.clone();
        let lookup = tokio::task::spawn_blocking(move || resolve_published_model(&layout, &baseline)).await;
        let entry = match lookup {
            Ok(Ok(Some(entry))) => entry,
            Ok(Ok(None)) => {
                return CheckResult::pass(
                    BASELINE_REGRESSION,
                    format!("no artifact published under {}; comparison skipped", self.baseline),
                );
            }
            Ok(Err(e)) => {
                return CheckResult::fail(BASELINE_REGRESSION, format!("baseline {} unreadable: {e}", self.baseline));
            }
            Err(e) => {
                return CheckResult::fail(BASELINE_REGRESSION, format!("baseline lookup failed: {e}"));
            }
        };

        if entry.metadata.sha256 == ctx.artifact.metadata.sha256 {
            return CheckResult::pass(BASELINE_REGRESSION, format!("identical to baseline {}", self.baseline));
        }

        let baseline_predictions = match ctx.runtime.load(&entry.model_path).await {
            Ok(model) => model.predict(ctx.samples).await,
            Err(e) => Err(e),
        };
        let baseline_predictions = match baseline_predictions {
            Ok(p) if p.len() == ctx.samples.len() => p,
            Ok(p) => {
                return CheckResult::fail(
                    BASELINE_REGRESSION,
                    format!("baseline {} returned {} predictions for {} rows", self.baseline, p.len(), ctx.samples.len()),
                );
            }
            Err(e) => {
                return CheckResult::fail(BASELINE_REGRESSION, format!("baseline {} failed to predict: {e}", self.baseline));
            }
        };

        let candidate_mae = mean_absolute_error(ctx.samples, ctx.predictions);
        let baseline_mae = mean_absolute_error(ctx.samples, &baseline_predictions);
        let limit = baseline_mae * (1.0 + self.max_relative_regression);
        let message = format!(
            "candidate MAE {candidate_mae:.4} vs baseline {} MAE {baseline_mae:.4} (limit {limit:.4})",
            self.baseline
        );
        if candidate_mae <= limit {
            CheckResult::pass(BASELINE_REGRESSION, message)
        } else {
            CheckResult::fail(BASELINE_REGRESSION, message)
        }
    }
}

fn mean_absolute_error(samples: &[CarRecord], predictions: &[f64]) -> f64 {
    let (sum, n) = samples
        .iter()
        .zip(predictions)
        .filter_map(|(rec, p)| rec.price.as_number().map(|actual| (actual - p).abs()))
        .fold((0.0, 0usize), |(sum, n), err| (sum + err, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelgate_training::{FieldValue, RunId, TrainingError, TrainingResult, make_artifact};
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::TempDir;

    /// Predicts `year` as the price; refuses to load files containing "corrupt".
    struct EchoRuntime;

    struct EchoModel {
        offset: f64,
    }

    #[async_trait]
    impl LoadedModel for EchoModel {
        async fn predict(&self, rows: &[CarRecord]) -> TrainingResult<Vec<f64>> {
            Ok(rows.iter().map(|r| r.year.as_number().unwrap_or(0.0) + self.offset).collect())
        }
    }

    #[async_trait]
    impl ModelRuntime for EchoRuntime {
        fn id(&self) -> &'static str {
            "echo"
        }

        async fn load(&self, path: &Path) -> TrainingResult<Box<dyn LoadedModel>> {
            let text = std::fs::read_to_string(path)?;
            if text.contains("corrupt") {
                return Err(TrainingError::Model("corrupt model".to_string()));
            }
            let offset = text.trim().parse::<f64>().map_err(|e| TrainingError::Model(e.to_string()))?;
            Ok(Box::new(EchoModel { offset }))
        }
    }

    fn rows() -> Vec<CarRecord> {
        (0..10)
            .map(|i| CarRecord {
                line: i + 1,
                price: FieldValue::Number(2000.0),
                year: FieldValue::Number(2000.0),
                mileage: FieldValue::Number(1.0),
                attributes: BTreeMap::new(),
            })
            .collect()
    }

    fn artifact(dir: &Path, name: &str, content: &str) -> ModelArtifact {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        let id = ArtifactIdentity::parse("cand").unwrap();
        make_artifact(&id, &RunId::for_commit(&id), path, None).unwrap()
    }

    fn layout(dir: &Path) -> StoreLayout {
        StoreLayout::new(dir.join("store"), "cars").unwrap()
    }

    fn publish_baseline(layout: &StoreLayout, id: &str, content: &str) {
        let identity = ArtifactIdentity::parse(id).unwrap();
        std::fs::create_dir_all(layout.artifact_dir(&identity)).unwrap();
        std::fs::write(layout.model_path(&identity), content).unwrap();
        let art = make_artifact(&identity, &RunId::for_commit(&identity), layout.model_path(&identity), None).unwrap();
        std::fs::write(layout.metadata_path(&identity), serde_json::to_vec(&art.metadata).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_healthy_model_passes() {
        let temp = TempDir::new().unwrap();
        let art = artifact(temp.path(), "m.bin", "0");
        let validator = ModelValidator::new(Arc::new(EchoRuntime)).with_sample_rows(3);

        let v = validator.validate(&art, &rows(), &layout(temp.path())).await;
        assert!(v.healthy);
        assert!(v.report.passed());
        assert_eq!(v.report.checks().len(), 2);
        assert!(v.into_verdict().1.is_ok());
    }

    #[tokio::test]
    async fn test_unloadable_model_is_unhealthy_and_reports_every_check() {
        let temp = TempDir::new().unwrap();
        let art = artifact(temp.path(), "m.bin", "corrupt");
        let check = BaselineRegressionCheck::new(ArtifactIdentity::parse("prod").unwrap(), 0.1).unwrap();
        let validator = ModelValidator::new(Arc::new(EchoRuntime)).with_check(Arc::new(check));

        let v = validator.validate(&art, &rows(), &layout(temp.path())).await;
        assert!(!v.healthy);
        assert!(!v.report.check(MODEL_LOADS).unwrap().passed);
        assert!(!v.report.check(SAMPLE_PREDICTION).unwrap().passed);
        assert!(!v.report.check(BASELINE_REGRESSION).unwrap().passed);
        let (_, verdict) = v.into_verdict();
        assert!(matches!(verdict, Err(PipelineError::ModelUnhealthy(_))));
    }

    #[tokio::test]
    async fn test_no_sample_rows_is_unhealthy() {
        let temp = TempDir::new().unwrap();
        let art = artifact(temp.path(), "m.bin", "0");
        let validator = ModelValidator::new(Arc::new(EchoRuntime));

        let v = validator.validate(&art, &[CarRecord::unreadable(1, "x")], &layout(temp.path())).await;
        assert!(!v.healthy);
    }

    #[tokio::test]
    async fn test_missing_baseline_passes() {
        let temp = TempDir::new().unwrap();
        let art = artifact(temp.path(), "m.bin", "0");
        let check = BaselineRegressionCheck::new(ArtifactIdentity::parse("prod").unwrap(), 0.0).unwrap();
        let validator = ModelValidator::new(Arc::new(EchoRuntime)).with_check(Arc::new(check));

        let v = validator.validate(&art, &rows(), &layout(temp.path())).await;
        assert!(v.report.passed(), "{}", v.report.summary());
        assert!(v.report.check(BASELINE_REGRESSION).unwrap().message.contains("comparison skipped"));
    }

    #[tokio::test]
    async fn test_regression_against_baseline_fails_gate() {
        let temp = TempDir::new().unwrap();
        let store = layout(temp.path());
        // Baseline predicts exactly (MAE 0), candidate is off by 100.
        publish_baseline(&store, "prod", "0");
        let art = artifact(temp.path(), "m.bin", "100");
        let check = BaselineRegressionCheck::new(ArtifactIdentity::parse("prod").unwrap(), 0.5).unwrap();
        let validator = ModelValidator::new(Arc::new(EchoRuntime)).with_check(Arc::new(check));

        let v = validator.validate(&art, &rows(), &store).await;
        assert!(v.healthy);
        assert!(!v.report.check(BASELINE_REGRESSION).unwrap().passed);
        let (_, verdict) = v.into_verdict();
        assert!(matches!(verdict, Err(PipelineError::ModelGateFailed(_))));
    }

    #[tokio::test]
    async fn test_improvement_over_baseline_passes() {
        let temp = TempDir::new().unwrap();
        let store = layout(temp.path());
        publish_baseline(&store, "prod", "50");
        let art = artifact(temp.path(), "m.bin", "10");
        let check = BaselineRegressionCheck::new(ArtifactIdentity::parse("prod").unwrap(), 0.0).unwrap();
        let validator = ModelValidator::new(Arc::new(EchoRuntime)).with_check(Arc::new(check));

        let v = validator.validate(&art, &rows(), &store).await;
        assert!(v.report.passed(), "{}", v.report.summary());
    }

    #[test]
    fn test_threshold_must_be_non_negative() {
        let id = ArtifactIdentity::parse("prod").unwrap();
        assert!(BaselineRegressionCheck::new(id.clone(), -0.1).is_err());
        assert!(BaselineRegressionCheck::new(id, f64::NAN).is_err());
    }
}
