//! `plugpack validate`: check an existing build directory.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use plugpack_core::{BuildContext, ToolAvailability};
use plugpack_pipeline::{validate_build, BuildExpectations, ValidationReport, ValidationStatus};

use super::ProjectArgs;

/// Arguments for `plugpack validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ValidationJson<'a> {
    build_dir: String,
    #[serde(flatten)]
    report: &'a ValidationReport,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "entry")]
    entry: String,
    #[tabled(rename = "expected")]
    expected: &'static str,
    #[tabled(rename = "status")]
    status: String,
}

impl ValidateArgs {
    pub fn run(self) -> Result<ExitCode> {
        let (root, config) = self.project.load()?;
        let ctx = BuildContext::new(&root, config, ToolAvailability::default(), None)
            .context("invalid project configuration")?;
        let expectations = BuildExpectations::from_context(&ctx);
        let report = validate_build(&ctx.build_dir, &expectations);

        if self.json {
            let payload = ValidationJson {
                build_dir: ctx.build_dir.display().to_string(),
                report: &report,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to serialize validation JSON")?
            );
        } else {
            print_table(&ctx, &expectations, &report);
        }

        Ok(if report.status == ValidationStatus::Fail {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }
}

fn print_table(ctx: &BuildContext, expectations: &BuildExpectations, report: &ValidationReport) {
    println!("Validating {}", ctx.build_dir.display());

    let expected = expectations
        .required_files
        .iter()
        .map(|e| (e, "file"))
        .chain(expectations.required_dirs.iter().map(|e| (e, "directory")))
        .chain(expectations.optional.iter().map(|e| (e, "optional")));
    let rows: Vec<EntryRow> = expected
        .map(|(entry, kind)| {
            let status = if report.present.contains(entry) {
                "present".green().to_string()
            } else if kind == "optional" {
                "missing".yellow().to_string()
            } else {
                "missing".red().to_string()
            };
            EntryRow {
                entry: entry.clone(),
                expected: kind,
                status,
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let status = report.status.to_string();
    let status = match report.status {
        ValidationStatus::Pass => status.green().bold(),
        ValidationStatus::Warning => status.yellow().bold(),
        ValidationStatus::Fail => status.red().bold(),
    };
    println!(
        "{status}: {} of {} expected entries present",
        report.present.len(),
        report.present.len() + report.missing_count()
    );
}
