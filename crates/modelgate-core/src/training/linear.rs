//! Built-in trainer and runtime: least-squares `price ~ year + mileage`.
//!
//! Lets the pipeline run end to end without external tooling. Features are
//! standardized before fitting; a tiny ridge term keeps constant columns solvable.

use async_trait::async_trait;
use modelgate_training::{
    CarRecord, LoadedModel, ModelRuntime, Trainer, TrainerOutcome, TrainingError, TrainingRequest,
    TrainingResult, load_dataset,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const LINEAR_MODEL_FORMAT: &str = "modelgate-linear-v1";
const RIDGE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub mean: f64,
    pub scale: f64,
    pub weight: f64,
}

impl FeatureWeight {
    fn contribution(&self, x: f64) -> f64 {
        self.weight * (x - self.mean) / self.scale
    }
}

/// Serialized form of the built-in model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPriceModel {
    pub format: String,
    pub intercept: f64,
    pub year: FeatureWeight,
    pub mileage: FeatureWeight,
    pub trained_rows: usize,
}

impl LinearPriceModel {
    pub fn fit(records: &[CarRecord]) -> TrainingResult<Self> {
        let rows: Vec<(f64, f64, f64)> = records
            .iter()
            .filter_map(|r| Some((r.year.as_number()?, r.mileage.as_number()?, r.price.as_number()?)))
            .collect();
        if rows.is_empty() {
            return Err(TrainingError::Trainer("no well-formed rows to fit".to_string()));
        }

        let (year_mean, year_scale) = moments(rows.iter().map(|r| r.0));
        let (mileage_mean, mileage_scale) = moments(rows.iter().map(|r| r.1));

        // Normal equations over [1, z_year, z_mileage].
        let mut xtx = [[0.0f64; 3]; 3];
        let mut xty = [0.0f64; 3];
        for &(year, mileage, price) in &rows {
            let x = [1.0, (year - year_mean) / year_scale, (mileage - mileage_mean) / mileage_scale];
            for i in 0..3 {
                xty[i] += x[i] * price;
                for j in 0..3 {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }
        xtx[1][1] += RIDGE;
        xtx[2][2] += RIDGE;

        let beta = solve3(xtx, xty)
            .ok_or_else(|| TrainingError::Trainer("normal equations are singular".to_string()))?;

        Ok(Self {
            format: LINEAR_MODEL_FORMAT.to_string(),
            intercept: beta[0],
            year: FeatureWeight { mean: year_mean, scale: year_scale, weight: beta[1] },
            mileage: FeatureWeight { mean: mileage_mean, scale: mileage_scale, weight: beta[2] },
            trained_rows: rows.len(),
        })
    }

    pub fn predict_one(&self, record: &CarRecord) -> TrainingResult<f64> {
        let year = record
            .year
            .as_number()
            .ok_or_else(|| TrainingError::Model(format!("line {}: year is not numeric", record.line)))?;
        let mileage = record
            .mileage
            .as_number()
            .ok_or_else(|| TrainingError::Model(format!("line {}: mileage is not numeric", record.line)))?;
        Ok(self.intercept + self.year.contribution(year) + self.mileage.contribution(mileage))
    }
}

/// Mean and standard deviation; a zero deviation is reported as 1.0.
fn moments(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count() as f64;
    let mean = values.clone().sum::<f64>() / n;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let sd = var.sqrt();
    (mean, if sd > f64::EPSILON { sd } else { 1.0 })
}

/// Gaussian elimination with partial pivoting.
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = ((row + 1)..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[derive(Debug, Default, Clone)]
pub struct LinearPriceTrainer;

#[async_trait]
impl Trainer for LinearPriceTrainer {
    fn id(&self) -> &'static str {
        "builtin-linear"
    }

    async fn train(&self, request: &TrainingRequest) -> TrainingResult<TrainerOutcome> {
        let dataset_path = request.dataset_path.clone();
        let model = tokio::task::spawn_blocking(move || {
            let records = load_dataset(&dataset_path)?;
            LinearPriceModel::fit(&records)
        })
        .await
        .map_err(|e| TrainingError::Trainer(format!("training task failed: {e}")))??;

        debug!(run_id = %request.run_id, rows = model.trained_rows, intercept = model.intercept, "fitted linear model");
        tokio::fs::write(&request.output_path, serde_json::to_vec_pretty(&model)?).await?;
        Ok(TrainerOutcome { exit_code: None, log_tail: Some(format!("fitted on {} rows", model.trained_rows)) })
    }
}

#[derive(Debug, Default, Clone)]
pub struct LinearModelRuntime;

#[async_trait]
impl ModelRuntime for LinearModelRuntime {
    fn id(&self) -> &'static str {
        "builtin-linear"
    }

    async fn load(&self, path: &Path) -> TrainingResult<Box<dyn LoadedModel>> {
        let bytes = tokio::fs::read(path).await?;
        let model: LinearPriceModel = serde_json::from_slice(&bytes)
            .map_err(|e| TrainingError::Model(format!("not a {LINEAR_MODEL_FORMAT} model: {e}")))?;
        if model.format != LINEAR_MODEL_FORMAT {
            return Err(TrainingError::Model(format!("unsupported model format {:?}", model.format)));
        }
        Ok(Box::new(model))
    }
}

#[async_trait]
impl LoadedModel for LinearPriceModel {
    async fn predict(&self, rows: &[CarRecord]) -> TrainingResult<Vec<f64>> {
        rows.iter().map(|r| self.predict_one(r)).collect()
    }
}
