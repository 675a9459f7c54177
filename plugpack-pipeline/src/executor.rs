//! Pipeline executor.
//!
//! Runs the steps in order. Per step:
//! - primary succeeds: `Succeeded`
//! - primary fails, fallback succeeds: `FallbackUsed`
//! - both fail (or no fallback) on a required step: `Failed`, and the run stops
//! - both fail on an optional step: `Skipped`, and the run continues
//!
//! The resulting [`PipelineReport`] is the single summary of a run; the CLI
//! only renders it.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use plugpack_core::{Artifact, ArtifactKind, BuildContext, VersionSource};

use crate::process::ProcessRunner;
use crate::step::{ActionOutcome, PipelineStep, StepEnv, StepName};
use crate::validate::{ValidationReport, ValidationStatus};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// How a step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    FallbackUsed { reason: String },
    Skipped { reason: String },
    Failed { reason: String },
}

/// One executed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: StepName,
    pub required: bool,
    pub outcome: StepOutcome,
    pub details: Vec<String>,
    pub warnings: Vec<String>,
    pub duration_ms: u128,
}

impl StepRecord {
    /// Degraded but not failed: skipped, or completed with warnings.
    pub fn has_warnings(&self) -> bool {
        matches!(self.outcome, StepOutcome::Skipped { .. }) || !self.warnings.is_empty()
    }
}

/// Verdict of the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Passed,
    PassedWithWarnings,
    Failed,
}

impl OverallStatus {
    pub fn is_success(self) -> bool {
        !matches!(self, OverallStatus::Failed)
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Passed => write!(f, "PASSED"),
            OverallStatus::PassedWithWarnings => write!(f, "PASSED WITH WARNINGS"),
            OverallStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub slug: String,
    pub version: String,
    pub version_source: VersionSource,
    pub project_root: PathBuf,
    pub build_dir: PathBuf,
    pub steps: Vec<StepRecord>,
    pub artifacts: Vec<Artifact>,
    pub validation: Option<ValidationReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub overall: OverallStatus,
}

impl PipelineReport {
    pub fn step(&self, name: StepName) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run `steps` against `ctx`.
pub fn run_pipeline(
    ctx: &BuildContext,
    runner: &dyn ProcessRunner,
    steps: &[PipelineStep],
) -> PipelineReport {
    run_pipeline_with(ctx, runner, steps, |_| {})
}

/// Run `steps` against `ctx`, calling `observer` after each step finishes.
pub fn run_pipeline_with<F>(
    ctx: &BuildContext,
    runner: &dyn ProcessRunner,
    steps: &[PipelineStep],
    mut observer: F,
) -> PipelineReport
where
    F: FnMut(&StepRecord),
{
    let started_at = Utc::now();
    let env = StepEnv { ctx, runner };
    let mut records = Vec::with_capacity(steps.len());
    let mut artifacts = Vec::new();
    let mut validation = None;
    let mut aborted = false;

    for step in steps {
        tracing::info!(step = %step.name, "starting step");
        let (record, produced) = run_step(&env, step);
        observer(&record);

        if let Some(outcome) = produced {
            artifacts.extend(outcome.artifact);
            if outcome.validation.is_some() {
                validation = outcome.validation;
            }
        }
        let failed = matches!(record.outcome, StepOutcome::Failed { .. });
        records.push(record);
        if failed {
            tracing::warn!(step = %step.name, "required step failed; aborting");
            aborted = true;
            break;
        }
    }

    let overall = overall_status(&records, validation.as_ref(), aborted);
    PipelineReport {
        slug: ctx.slug.clone(),
        version: ctx.version().to_string(),
        version_source: ctx.version.source.clone(),
        project_root: ctx.project_root.clone(),
        build_dir: ctx.build_dir.clone(),
        steps: records,
        artifacts,
        validation,
        started_at,
        finished_at: Utc::now(),
        overall,
    }
}

/// Execute one step with its fallback; returns the record and, on success,
/// the action's outcome.
fn run_step(env: &StepEnv<'_>, step: &PipelineStep) -> (StepRecord, Option<ActionOutcome>) {
    let started = Instant::now();
    let record = |outcome: StepOutcome, details: Vec<String>, warnings: Vec<String>| StepRecord {
        name: step.name,
        required: step.required,
        outcome,
        details,
        warnings,
        duration_ms: started.elapsed().as_millis(),
    };

    let primary_error = match (step.action)(env) {
        Ok(outcome) => {
            let rec = record(
                StepOutcome::Succeeded,
                outcome.details.clone(),
                outcome.warnings.clone(),
            );
            return (rec, Some(outcome));
        }
        Err(err) => err.to_string(),
    };

    let reason = match step.fallback {
        Some(fallback) => {
            tracing::info!(step = %step.name, reason = %primary_error, "primary failed; trying fallback");
            match fallback(env) {
                Ok(outcome) => {
                    let rec = record(
                        StepOutcome::FallbackUsed {
                            reason: primary_error,
                        },
                        outcome.details.clone(),
                        outcome.warnings.clone(),
                    );
                    return (rec, Some(outcome));
                }
                Err(err) => format!("{primary_error}; fallback: {err}"),
            }
        }
        None => primary_error,
    };

    if step.required {
        (record(StepOutcome::Failed { reason }, Vec::new(), Vec::new()), None)
    } else {
        tracing::warn!(step = %step.name, %reason, "optional step skipped");
        (record(StepOutcome::Skipped { reason }, Vec::new(), Vec::new()), None)
    }
}

fn overall_status(
    records: &[StepRecord],
    validation: Option<&ValidationReport>,
    aborted: bool,
) -> OverallStatus {
    if aborted || validation.is_some_and(|v| v.status == ValidationStatus::Fail) {
        return OverallStatus::Failed;
    }
    let degraded = records.iter().any(StepRecord::has_warnings)
        || validation.is_some_and(|v| v.status == ValidationStatus::Warning);
    if degraded {
        OverallStatus::PassedWithWarnings
    } else {
        OverallStatus::Passed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use plugpack_core::{PlugpackConfig, ToolAvailability};
    use tempfile::TempDir;

    use crate::error::{ProcessError, StepFailure};
    use crate::process::{Invocation, ProcessOutput};

    struct NoProcesses;

    impl ProcessRunner for NoProcesses {
        fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
            panic!("unexpected process: {}", invocation.display());
        }

        fn is_privileged(&self) -> bool {
            false
        }

        fn grant_ownership(&self, _path: &Path, _user: &str) -> Result<(), ProcessError> {
            Ok(())
        }
    }

    fn ok(_: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
        Ok(ActionOutcome::default().detail("done"))
    }

    fn warn(_: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
        let mut outcome = ActionOutcome::default();
        outcome.warnings.push("degraded".to_string());
        Ok(outcome)
    }

    fn fail(_: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
        Err(StepFailure::Unmet("boom".to_string()))
    }

    fn context(dir: &TempDir) -> BuildContext {
        BuildContext::new(
            dir.path(),
            PlugpackConfig::default(),
            ToolAvailability::default(),
            None,
        )
        .expect("context")
    }

    #[test]
    fn required_failure_stops_the_run() {
        let dir = TempDir::new().expect("tempdir");
        let steps = [
            PipelineStep::required(StepName::Clean, ok),
            PipelineStep::required(StepName::Build, fail),
            PipelineStep::required(StepName::Reconcile, ok),
        ];
        let report = run_pipeline(&context(&dir), &NoProcesses, &steps);
        assert_eq!(report.steps.len(), 2);
        assert_eq!(
            report.steps[1].outcome,
            StepOutcome::Failed {
                reason: "boom".to_string()
            }
        );
        assert_eq!(report.overall, OverallStatus::Failed);
    }

    #[test]
    fn fallback_success_is_recorded_with_primary_reason() {
        let dir = TempDir::new().expect("tempdir");
        let steps = [PipelineStep::required(StepName::Build, fail).with_fallback(ok)];
        let report = run_pipeline(&context(&dir), &NoProcesses, &steps);
        assert_eq!(
            report.steps[0].outcome,
            StepOutcome::FallbackUsed {
                reason: "boom".to_string()
            }
        );
        assert_eq!(report.steps[0].details, vec!["done".to_string()]);
        assert_eq!(report.overall, OverallStatus::Passed);
    }

    #[test]
    fn failed_fallback_reports_both_reasons() {
        let dir = TempDir::new().expect("tempdir");
        let steps = [PipelineStep::required(StepName::Package, fail).with_fallback(fail)];
        let report = run_pipeline(&context(&dir), &NoProcesses, &steps);
        assert_eq!(
            report.steps[0].outcome,
            StepOutcome::Failed {
                reason: "boom; fallback: boom".to_string()
            }
        );
    }

    #[test]
    fn optional_failure_is_skipped_and_run_continues() {
        let dir = TempDir::new().expect("tempdir");
        let steps = [
            PipelineStep::optional(StepName::Translations, fail),
            PipelineStep::required(StepName::Package, ok),
        ];
        let mut seen = Vec::new();
        let report = run_pipeline_with(&context(&dir), &NoProcesses, &steps, |r| seen.push(r.name));
        assert_eq!(seen, vec![StepName::Translations, StepName::Package]);
        assert!(matches!(report.steps[0].outcome, StepOutcome::Skipped { .. }));
        assert_eq!(report.overall, OverallStatus::PassedWithWarnings);
    }

    #[test]
    fn warnings_degrade_overall_status() {
        let dir = TempDir::new().expect("tempdir");
        let steps = [PipelineStep::required(StepName::Dependencies, warn)];
        let report = run_pipeline(&context(&dir), &NoProcesses, &steps);
        assert_eq!(report.overall, OverallStatus::PassedWithWarnings);
        assert!(report.overall.is_success());
    }

    #[test]
    fn report_serializes_outcomes_with_status_tag() {
        let dir = TempDir::new().expect("tempdir");
        let steps = [
            PipelineStep::required(StepName::Build, fail).with_fallback(ok),
            PipelineStep::optional(StepName::Translations, fail),
        ];
        let report = run_pipeline(&context(&dir), &NoProcesses, &steps);
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["steps"][0]["name"], "build");
        assert_eq!(json["steps"][0]["outcome"]["status"], "fallback_used");
        assert_eq!(json["steps"][1]["outcome"]["status"], "skipped");
        assert_eq!(json["overall"], "passed_with_warnings");
        assert_eq!(json["version_source"]["kind"], "fallback");
    }

    #[test]
    fn overall_status_labels() {
        assert_eq!(OverallStatus::PassedWithWarnings.to_string(), "PASSED WITH WARNINGS");
        assert!(!OverallStatus::Failed.is_success());
    }
}
