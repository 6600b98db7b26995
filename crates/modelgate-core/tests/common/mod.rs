//! Shared fixtures for modelgate-core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use modelgate_core::Pipeline;
use modelgate_core::training::{LinearModelRuntime, LinearPriceTrainer};
use modelgate_training::{Trainer, TrainerOutcome, TrainingRequest, TrainingResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Route pipeline logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Write `rows` valid listings to `<dir>/<name>`. `price_offset` changes the
/// prices (and therefore the trained model) without changing validity.
pub fn write_cars_csv(dir: &Path, name: &str, rows: usize, price_offset: f64) -> PathBuf {
    let mut out = String::from("price,year,mileage,make,fuel\n");
    for i in 0..rows {
        let year = 2000 + (i % 20);
        let mileage = (i % 37) * 4_000 + (i % 5) * 150;
        let price = 30_000.0 - (2020 - year) as f64 * 900.0 - mileage as f64 * 0.04 + price_offset;
        out.push_str(&format!("{price:.2},{year},{mileage},make{},petrol\n", i % 7));
    }
    let path = dir.join(name);
    std::fs::write(&path, out).unwrap();
    path
}

/// Same listings as [`write_cars_csv`], one JSON object per line.
pub fn write_cars_jsonl(dir: &Path, name: &str, rows: usize) -> PathBuf {
    let mut out = String::new();
    for i in 0..rows {
        let year = 2000 + (i % 20);
        let mileage = (i % 37) * 4_000 + (i % 5) * 150;
        let price = 30_000.0 - (2020 - year) as f64 * 900.0 - mileage as f64 * 0.04;
        out.push_str(&format!(
            "{{\"price\": {price:.2}, \"year\": {year}, \"mileage\": {mileage}, \"make\": \"make{}\"}}\n",
            i % 7
        ));
    }
    let path = dir.join(name);
    std::fs::write(&path, out).unwrap();
    path
}

/// Directory layout for one test: dataset dir, store root, work dir.
pub struct Workspace {
    pub temp: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        init_tracing();
        Self { temp: tempfile::TempDir::new().unwrap() }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn store_root(&self) -> PathBuf {
        self.temp.path().join("store")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.temp.path().join("work")
    }

    /// Pipeline using the built-in linear backend.
    pub fn builtin_pipeline(&self) -> Pipeline {
        self.pipeline_with(Arc::new(LinearPriceTrainer))
    }

    pub fn pipeline_with(&self, trainer: Arc<dyn Trainer>) -> Pipeline {
        Pipeline::new(trainer, Arc::new(LinearModelRuntime), self.store_root(), self.work_dir())
    }

    /// Entries left in the work dir (scratch directories that were not cleaned up).
    pub fn scratch_leftovers(&self) -> usize {
        std::fs::read_dir(self.work_dir()).map(|d| d.count()).unwrap_or(0)
    }
}

/// Delegates to the built-in trainer and counts invocations.
#[derive(Default)]
pub struct CountingTrainer {
    pub calls: AtomicUsize,
}

impl CountingTrainer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Trainer for CountingTrainer {
    fn id(&self) -> &'static str {
        "counting"
    }

    async fn train(&self, request: &TrainingRequest) -> TrainingResult<TrainerOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        LinearPriceTrainer.train(request).await
    }
}

/// Writes a partial output, then hangs.
pub struct HangingTrainer;

#[async_trait]
impl Trainer for HangingTrainer {
    fn id(&self) -> &'static str {
        "hanging"
    }

    async fn train(&self, request: &TrainingRequest) -> TrainingResult<TrainerOutcome> {
        tokio::fs::write(&request.output_path, b"partial").await?;
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(TrainerOutcome::default())
    }
}

/// Succeeds with bytes no runtime can load.
pub struct GarbageTrainer;

#[async_trait]
impl Trainer for GarbageTrainer {
    fn id(&self) -> &'static str {
        "garbage"
    }

    async fn train(&self, request: &TrainingRequest) -> TrainingResult<TrainerOutcome> {
        tokio::fs::write(&request.output_path, b"\x00not a model").await?;
        Ok(TrainerOutcome { exit_code: Some(0), log_tail: None })
    }
}

/// Cancels the run from inside the training step, then hangs like a slow trainer.
pub struct CancellingTrainer {
    pub token: tokio_util::sync::CancellationToken,
}

#[async_trait]
impl Trainer for CancellingTrainer {
    fn id(&self) -> &'static str {
        "cancelling"
    }

    async fn train(&self, request: &TrainingRequest) -> TrainingResult<TrainerOutcome> {
        tokio::fs::write(&request.output_path, b"partial").await?;
        self.token.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(TrainerOutcome::default())
    }
}
