//! `plugpack build`: run the packaging pipeline.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use plugpack_core::BuildContext;
use plugpack_detector::probe_tools;
use plugpack_pipeline::{
    default_steps, resolve_run_as, run_pipeline_with, OverallStatus, PipelineReport,
    ProcessRunner, StepOutcome, StepRecord, SystemRunner,
};

use super::{human_size, ProjectArgs};

/// Arguments for `plugpack build`.
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Per-step timeout for external tools, in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run the translation extractor as this user.
    #[arg(long, value_name = "USER")]
    pub run_as: Option<String>,

    /// Emit the run report as JSON instead of the transcript.
    #[arg(long)]
    pub json: bool,
}

impl BuildArgs {
    pub fn run(self) -> Result<ExitCode> {
        let (root, mut config) = self.project.load()?;
        if let Some(secs) = self.timeout {
            config.step_timeout_secs = secs;
        }
        if let Some(user) = self.run_as {
            config.run_as = Some(user);
        }

        let runner = SystemRunner::new().context("failed to start process runner")?;
        let sudo_user = std::env::var("SUDO_USER").ok();
        let run_as = resolve_run_as(
            config.run_as.as_deref(),
            runner.is_privileged(),
            sudo_user.as_deref(),
        );
        let tools = probe_tools(&root, &config);
        let ctx = BuildContext::new(&root, config, tools, run_as)
            .context("invalid build configuration")?;

        let json = self.json;
        if !json {
            println!(
                "Packaging {} {} (version from {})",
                ctx.slug.bold(),
                ctx.version().bold(),
                ctx.version.source
            );
        }
        let report = run_pipeline_with(&ctx, &runner, &default_steps(), |record| {
            if !json {
                print_step(record);
            }
        });

        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        } else {
            print_summary(&report);
        }

        Ok(if report.overall.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

fn marker(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Succeeded => "✓".green().bold().to_string(),
        StepOutcome::FallbackUsed { .. } => "↺".cyan().bold().to_string(),
        StepOutcome::Skipped { .. } => "⚠".yellow().bold().to_string(),
        StepOutcome::Failed { .. } => "✗".red().bold().to_string(),
    }
}

fn outcome_label(outcome: &StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Succeeded => "ok",
        StepOutcome::FallbackUsed { .. } => "fallback",
        StepOutcome::Skipped { .. } => "skipped",
        StepOutcome::Failed { .. } => "failed",
    }
}

fn print_step(record: &StepRecord) {
    println!(
        "{} {:<13} {}",
        marker(&record.outcome),
        record.name.to_string(),
        format!("{} ms", record.duration_ms).bright_black()
    );
    match &record.outcome {
        StepOutcome::Succeeded => {}
        StepOutcome::FallbackUsed { reason } => {
            println!("    fallback used: {reason}");
        }
        StepOutcome::Skipped { reason } => {
            println!("    {}", format!("skipped: {reason}").yellow());
        }
        StepOutcome::Failed { reason } => {
            println!("    {}", reason.red());
        }
    }
    for detail in &record.details {
        println!("    · {detail}");
    }
    for warning in &record.warnings {
        println!("    {}", format!("⚠ {warning}").yellow());
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "step")]
    step: String,
    #[tabled(rename = "required")]
    required: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "time")]
    time: String,
}

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "archive")]
    archive: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "size")]
    size: String,
    #[tabled(rename = "sha256")]
    sha256: String,
}

fn print_summary(report: &PipelineReport) {
    println!();
    let rows: Vec<StepRow> = report
        .steps
        .iter()
        .map(|record| StepRow {
            step: record.name.to_string(),
            required: if record.required { "yes" } else { "no" }.to_string(),
            result: outcome_label(&record.outcome).to_string(),
            time: format!("{} ms", record.duration_ms),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if !report.artifacts.is_empty() {
        let rows: Vec<ArtifactRow> = report
            .artifacts
            .iter()
            .map(|artifact| ArtifactRow {
                archive: artifact.path.display().to_string(),
                kind: artifact.kind.to_string(),
                size: human_size(artifact.size_bytes),
                sha256: artifact.sha256.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if let Some(validation) = &report.validation {
        println!(
            "Validation: {} ({} present, {} missing required, {} missing optional)",
            validation.status,
            validation.present.len(),
            validation.missing_required.len(),
            validation.missing_optional.len()
        );
    }

    let status = report.overall.to_string();
    let status = match report.overall {
        OverallStatus::Passed => status.green().bold(),
        OverallStatus::PassedWithWarnings => status.yellow().bold(),
        OverallStatus::Failed => status.red().bold(),
    };
    let elapsed = report.finished_at - report.started_at;
    println!(
        "{} {} {} in {:.1}s",
        report.slug,
        report.version,
        status,
        elapsed.num_milliseconds() as f64 / 1000.0
    );
}
