//! Human-readable output for pipeline results.

use colored::Colorize;
use modelgate_core::{PipelineResult, PipelineStatus, ValidationReport};
use modelgate_training::RunStatus;

pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

pub fn pipeline_result(result: &PipelineResult) {
    println!("{} {}", "Run".bold().cyan(), result.run_id.to_string().bold());

    let path: Vec<&str> = result.transitions.iter().map(|s| s.as_str()).collect();
    println!("  Stages: {}", path.join(" → ").dimmed());
    println!();

    if let Some(report) = &result.data_report {
        report_section("Data validation", report);
    }

    if let Some(run) = &result.training_run {
        println!("{}", "Training:".bold());
        let status = match run.status {
            RunStatus::Succeeded => "succeeded".green(),
            RunStatus::Failed => "failed".red(),
            RunStatus::Pending => "pending".yellow(),
        };
        println!("  Status:   {status}");
        if let Some(ms) = run.duration_ms {
            println!("  Duration: {:.1}s", ms as f64 / 1000.0);
        }
        if let Some(code) = run.exit_code {
            println!("  Exit:     {code}");
        }
        if let Some(reason) = &run.failure {
            println!("  Reason:   {}", reason.red());
        }
        println!();
    }

    if let Some(report) = &result.model_report {
        report_section("Model validation", report);
    }

    if let Some(published) = &result.published {
        println!("{}", "Published:".bold());
        println!("  Identity: {}", published.identity.green());
        println!("  Location: {}", published.location.display());
        println!("  SHA-256:  {}", published.sha256.dimmed());
        if published.already_present {
            println!("  {}", "identical artifact was already published".yellow());
        }
        println!();
    }

    match &result.status {
        PipelineStatus::Succeeded => println!("{} {}", "✓".green(), "Pipeline succeeded".green().bold()),
        PipelineStatus::Failed { stage, kind, message } => {
            println!("{} {} at {}: {}", "✗".red(), kind.to_string().red().bold(), stage, message);
        }
    }
}

fn report_section(title: &str, report: &ValidationReport) {
    println!("{}", format!("{title}:").bold());
    for check in report.checks() {
        let mark = if check.passed { "✓".green() } else { "✗".red() };
        println!("  {mark} {:<20} {}", check.check_name, check.message.dimmed());
    }
    println!();
}
