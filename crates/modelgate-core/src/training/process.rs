//! External-command backends for training and inference.

use async_trait::async_trait;
use modelgate_training::{
    CarRecord, LoadedModel, ModelRuntime, Trainer, TrainerOutcome, TrainingError, TrainingRequest,
    TrainingResult,
};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const LOG_TAIL_LINES: usize = 20;

/// Replace `{name}` placeholders in each argument.
fn expand_args(args: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            vars.iter()
                .fold(arg.clone(), |acc, (name, value)| acc.replace(&format!("{{{name}}}"), value))
        })
        .collect()
}

fn tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(LOG_TAIL_LINES);
    lines[start..].join("\n")
}

/// Run a command to completion, capturing output.
///
/// The child is killed if the returned future is dropped, which is how
/// timeouts and cancellation stop a running trainer.
async fn run_command(program: &str, args: &[String]) -> TrainingResult<std::process::Output> {
    debug!(program, ?args, "spawning command");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| TrainingError::Trainer(format!("failed to spawn `{program}`: {e}")))?;
    Ok(output)
}

/// Trainer that shells out, e.g. `python train.py {data} {output}`.
#[derive(Debug, Clone)]
pub struct ProcessTrainer {
    program: String,
    args: Vec<String>,
}

impl ProcessTrainer {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }
}

#[async_trait]
impl Trainer for ProcessTrainer {
    fn id(&self) -> &'static str {
        "process"
    }

    async fn train(&self, request: &TrainingRequest) -> TrainingResult<TrainerOutcome> {
        let data = request.dataset_path.to_string_lossy();
        let output = request.output_path.to_string_lossy();
        let args = expand_args(
            &self.args,
            &[("data", data.as_ref()), ("output", output.as_ref()), ("run_id", request.run_id.0.as_str())],
        );

        let out = run_command(&self.program, &args).await?;
        let log_tail = tail(&out.stderr);
        if !out.status.success() {
            return Err(TrainingError::TrainerExited {
                program: self.program.clone(),
                status: out.status.to_string(),
                exit_code: out.status.code(),
                log_tail,
            });
        }
        Ok(TrainerOutcome {
            exit_code: out.status.code(),
            log_tail: (!log_tail.is_empty()).then_some(log_tail),
        })
    }
}

/// Runtime that delegates inference to a command.
///
/// The command receives `{model}` (artifact path) and `{input}` (a JSON file
/// holding an array of feature objects) and must print a JSON array of numbers.
#[derive(Debug, Clone)]
pub struct ProcessModelRuntime {
    program: String,
    args: Vec<String>,
}

impl ProcessModelRuntime {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }
}

#[async_trait]
impl ModelRuntime for ProcessModelRuntime {
    fn id(&self) -> &'static str {
        "process"
    }

    async fn load(&self, path: &Path) -> TrainingResult<Box<dyn LoadedModel>> {
        let md = tokio::fs::metadata(path).await?;
        if !md.is_file() || md.len() == 0 {
            return Err(TrainingError::Model(format!("{} is not a non-empty file", path.display())));
        }
        Ok(Box::new(ProcessModel {
            program: self.program.clone(),
            args: self.args.clone(),
            model_path: path.to_path_buf(),
        }))
    }
}

struct ProcessModel {
    program: String,
    args: Vec<String>,
    model_path: PathBuf,
}

#[async_trait]
impl LoadedModel for ProcessModel {
    async fn predict(&self, rows: &[CarRecord]) -> TrainingResult<Vec<f64>> {
        let features: Vec<serde_json::Value> = rows.iter().map(CarRecord::features_json).collect();
        let input = tempfile::Builder::new().prefix("modelgate-input-").suffix(".json").tempfile()?;
        tokio::fs::write(input.path(), serde_json::to_vec(&features)?).await?;

        let model = self.model_path.to_string_lossy();
        let input_path = input.path().to_string_lossy();
        let args = expand_args(&self.args, &[("model", model.as_ref()), ("input", input_path.as_ref())]);

        let out = run_command(&self.program, &args).await?;
        if !out.status.success() {
            return Err(TrainingError::Model(format!(
                "`{}` exited with {}: {}",
                self.program,
                out.status,
                tail(&out.stderr)
            )));
        }
        serde_json::from_slice::<Vec<f64>>(&out.stdout)
            .map_err(|e| TrainingError::Model(format!("predict output is not a JSON array of numbers: {e}")))
    }
}
