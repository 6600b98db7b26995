//! Modelgate CLI - gated train-and-publish pipeline for CI.
//!
//! Provides the `modelgate` command. Exit codes: 0 succeeded, 1 data gate,
//! 2 training, 3 model gate, 4 publish, 64 usage or configuration error.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use modelgate_core::pipeline::EXIT_USAGE;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Modelgate - validate data, train, validate the model, publish by commit id
#[derive(Parser, Debug)]
#[command(name = "modelgate", author, version, about = "Gated model training and publishing pipeline")]
struct Args {
    /// Log level or filter directive (overrides RUST_LOG and config)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Extra config file, applied after ~/.modelgate/config.toml and ./modelgate.toml
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Artifact store root (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    store_root: Option<PathBuf>,

    /// Artifact namespace (overrides config)
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline for one commit
    ///
    /// Resolves the dataset, runs the data gate, trains, runs the model gate
    /// and publishes the artifact under the commit id.
    Run {
        /// Dataset reference (path, path under data_root, or file:// URL)
        dataset: String,

        /// Commit or change id used as run id and artifact identity
        #[arg(long)]
        commit: String,

        /// Maximum training wall-clock time in seconds
        #[arg(long, value_name = "SECS")]
        max_training_secs: Option<u64>,

        /// Scratch directory for training output
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,

        /// Base directory for relative dataset references
        #[arg(long, value_name = "DIR")]
        data_root: Option<PathBuf>,

        /// Print the pipeline result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a dataset and run only the data gate
    CheckData {
        /// Dataset reference
        dataset: String,

        /// Base directory for relative dataset references
        #[arg(long, value_name = "DIR")]
        data_root: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List published artifacts in the namespace
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one published artifact
    Show {
        /// Artifact identity (commit id)
        identity: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version print to stdout and are not errors.
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            return exit_code(code);
        }
    };

    match run(args).await {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            exit_code(EXIT_USAGE)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<i32> {
    let overrides = config::Overrides::from_args(&args);
    let cfg = config::load_config(args.config.as_deref(), &overrides)?;
    init_tracing(args.log_level.as_deref(), cfg.log_level.as_deref())?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling pipeline");
            trigger.cancel();
        }
    });

    match args.command {
        Command::Run { dataset, commit, json, .. } => commands::run::execute(&cfg, &dataset, &commit, json, &cancel).await,
        Command::CheckData { dataset, json, .. } => commands::check::execute(&cfg, &dataset, json, &cancel).await,
        Command::List { json } => commands::list::execute(&cfg, json),
        Command::Show { identity, json } => commands::show::execute(&cfg, &identity, json),
    }
}

/// Install the stderr subscriber. Precedence: flag, `RUST_LOG`, config, `info`.
fn init_tracing(flag: Option<&str>, configured: Option<&str>) -> anyhow::Result<()> {
    let filter = match flag {
        Some(directive) => EnvFilter::try_new(directive)?,
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(configured.unwrap_or("info")))?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;
    Ok(())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
