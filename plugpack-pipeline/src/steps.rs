//! Step actions.
//!
//! Each function here is one primary or fallback action referenced by
//! [`default_steps`](crate::step::default_steps). Actions read the context,
//! write only their own outputs and report through [`ActionOutcome`].

use std::fs;
use std::path::Path;

use plugpack_core::ArtifactKind;
use plugpack_detector::{check_gate, GateNotice};

use crate::archive::{archive_entries, build_archive, describe_artifact, entries_nested_under};
use crate::error::{io_err, StepFailure};
use crate::process::{Invocation, ProcessOutput, OUTPUT_TAIL_LINES};
use crate::reconcile::reconcile_files;
use crate::step::{ActionOutcome, StepEnv};
use crate::tree::{self, ExcludeSet};
use crate::validate::{validate_build, BuildExpectations};

/// Interpreter used for the external validation script.
const SCRIPT_SHELL: &str = "bash";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An invocation of `program` from the project root with the step timeout.
fn tool(env: &StepEnv<'_>, program: &Path) -> Invocation {
    Invocation::new(program, &env.ctx.project_root, env.ctx.step_timeout)
}

/// Run `invocation`; a non-zero exit becomes [`StepFailure::ToolFailed`].
fn run_tool(env: &StepEnv<'_>, invocation: &Invocation) -> Result<ProcessOutput, StepFailure> {
    let output = env.runner.run(invocation)?;
    if output.success() {
        Ok(output)
    } else {
        Err(StepFailure::ToolFailed {
            command: invocation.display(),
            status: output.status_label(),
            output_tail: output.tail(OUTPUT_TAIL_LINES),
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// dependencies
// ---------------------------------------------------------------------------

/// Gate check, then PHP and Node dependency installation.
///
/// A failed Composer install aborts (the build would ship without `vendor/`);
/// a failed npm install only degrades the delegated build, which has its own
/// fallback.
pub fn install_dependencies(env: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
    let ctx = env.ctx;
    let mut outcome = ActionOutcome::default();

    for notice in check_gate(&ctx.tools, &ctx.config)? {
        match notice {
            GateNotice::NodeManagerMissing => outcome.warnings.push(notice.to_string()),
            other => outcome.details.push(other.to_string()),
        }
    }

    if ctx.tools.needs_php_dependencies {
        let Some(composer) = &ctx.tools.php_dependency_manager else {
            return Err(StepFailure::Unmet(
                "PHP dependency manager disappeared after the gate check".to_string(),
            ));
        };
        let install = tool(env, composer)
            .arg("install")
            .arg("--no-dev")
            .arg("--optimize-autoloader")
            .arg("--no-interaction");
        run_tool(env, &install)?;
        outcome.details.push("installed PHP dependencies".to_string());
    }

    if ctx.tools.needs_node_dependencies {
        if let Some(npm) = &ctx.tools.node_dependency_manager {
            let lockfile = ctx.project_root.join("package-lock.json").is_file();
            let install = tool(env, npm).arg(if lockfile { "ci" } else { "install" });
            match run_tool(env, &install) {
                Ok(_) => outcome.details.push("installed Node dependencies".to_string()),
                Err(err) => {
                    tracing::warn!(error = %err, "node dependency install failed");
                    outcome
                        .warnings
                        .push(format!("Node dependency install failed: {err}"));
                }
            }
        }
    }

    Ok(outcome)
}

// ---------------------------------------------------------------------------
// clean
// ---------------------------------------------------------------------------

/// Reset the build directory and delete this version's previous archives.
pub fn clean_workspace(env: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
    let ctx = env.ctx;
    tree::reset_dir(&ctx.build_dir, &ctx.project_root)?;
    let mut outcome = ActionOutcome::default().detail(format!("reset {}", ctx.build_dir.display()));

    for kind in [ArtifactKind::Production, ArtifactKind::Development] {
        let path = ctx.artifact_path(kind);
        if tree::remove_file_if_exists(&path)? {
            outcome = outcome.detail(format!("removed previous {}", file_name(&path)));
        }
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

/// Run the task runner's build task and require a non-empty build directory.
pub fn delegated_build(env: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
    let ctx = env.ctx;
    let Some(runner) = &ctx.tools.task_runner else {
        return Err(StepFailure::Unmet(format!(
            "task runner '{}' not available",
            ctx.config.task_runner
        )));
    };

    run_tool(env, &tool(env, runner).arg(&ctx.config.build_task))?;

    if !tree::has_entries(&ctx.build_dir) {
        return Err(StepFailure::Unmet(format!(
            "'{}' task finished but {} is missing or empty",
            ctx.config.build_task,
            ctx.build_dir.display()
        )));
    }
    Ok(ActionOutcome::default().detail(format!(
        "ran {} {}",
        ctx.config.task_runner, ctx.config.build_task
    )))
}

/// Copy the raw source tree into the build directory.
pub fn copy_source_tree(env: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
    let ctx = env.ctx;
    tree::reset_dir(&ctx.build_dir, &ctx.project_root)?;

    let mut excludes = ExcludeSet::new(&ctx.config.copy_exclude)?;
    for dir in [&ctx.build_dir, &ctx.dist_dir] {
        if let Some(relative) = tree::relative_to(dir, &ctx.source_dir) {
            excludes = excludes.with_path(&relative);
        }
    }

    let copied = tree::copy_tree(&ctx.source_dir, &ctx.build_dir, &excludes)?;
    if copied == 0 {
        return Err(StepFailure::Unmet(format!(
            "source tree {} has no files to copy",
            ctx.source_dir.display()
        )));
    }
    Ok(ActionOutcome::default().detail(format!("copied {copied} files from the source tree")))
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

/// Copy license, readme and main plugin file into the build when absent there.
pub fn reconcile_auxiliary(env: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
    let ctx = env.ctx;
    let mut names = ctx.expanded(&ctx.config.auxiliary_files);
    let main_file = ctx.main_plugin_file();
    if !names.contains(&main_file) {
        names.push(main_file);
    }

    let summary = reconcile_files(&ctx.project_root, &ctx.build_dir, &names)?;
    let mut outcome = ActionOutcome::default();
    if summary.copied.is_empty() {
        outcome = outcome.detail("nothing to copy");
    } else {
        outcome = outcome.detail(format!("copied {}", summary.copied.join(", ")));
    }
    if !summary.already_present.is_empty() {
        outcome = outcome.detail(format!(
            "already present: {}",
            summary.already_present.join(", ")
        ));
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// translations
// ---------------------------------------------------------------------------

/// Generate `languages/<slug>.pot` inside the build output.
pub fn extract_translations(env: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
    let ctx = env.ctx;
    let Some(extractor) = &ctx.tools.translation_tool else {
        return Err(StepFailure::Unmet(format!(
            "translation extractor '{}' not available",
            ctx.config.translation_tool
        )));
    };

    let pot = ctx.pot_path();
    if let Some(languages) = pot.parent() {
        fs::create_dir_all(languages).map_err(|e| io_err(languages, e))?;
        if let Some(user) = &ctx.run_as {
            env.runner.grant_ownership(languages, user)?;
        }
    }

    let mut invocation = tool(env, extractor)
        .arg("i18n")
        .arg("make-pot")
        .arg(&ctx.build_dir)
        .arg(&pot)
        .arg(format!("--slug={}", ctx.slug))
        .arg(format!("--domain={}", ctx.slug));
    if !ctx.config.pot_exclude.is_empty() {
        invocation = invocation.arg(format!("--exclude={}", ctx.config.pot_exclude.join(",")));
    }
    // WP-CLI refuses to run as root without this flag.
    if ctx.run_as.is_none() && env.runner.is_privileged() {
        invocation = invocation.arg("--allow-root");
    }
    let invocation = invocation.run_as(ctx.run_as.clone());

    run_tool(env, &invocation)?;

    if !pot.is_file() {
        return Err(StepFailure::Unmet(format!(
            "extractor finished but {} was not created",
            pot.display()
        )));
    }
    Ok(ActionOutcome::default().detail(format!("wrote languages/{}", file_name(&pot))))
}

// ---------------------------------------------------------------------------
// package
// ---------------------------------------------------------------------------

/// Run the task runner's archive task and verify what it produced.
///
/// An archive whose entries are not all nested under `<slug>/` is removed and
/// reported as a failure, so the direct archiver rebuilds it.
pub fn delegated_archive(env: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
    let ctx = env.ctx;
    let (Some(runner), true) = (&ctx.tools.task_runner, ctx.tools.delegated_archiver()) else {
        return Err(StepFailure::Unmet(format!(
            "archiver plugin '{}' not installed",
            ctx.config.archiver_plugin
        )));
    };

    let dest = ctx.artifact_path(ArtifactKind::Production);
    run_tool(env, &tool(env, runner).arg(&ctx.config.archive_task))?;

    if !dest.is_file() {
        return Err(StepFailure::Unmet(format!(
            "'{}' task did not produce {}",
            ctx.config.archive_task,
            dest.display()
        )));
    }
    let entries = archive_entries(&dest)?;
    if !entries_nested_under(&entries, &ctx.slug) {
        tree::remove_file_if_exists(&dest)?;
        return Err(StepFailure::Unmet(format!(
            "{} does not nest its contents under {}/",
            file_name(&dest),
            ctx.slug
        )));
    }

    let artifact = describe_artifact(&dest, ArtifactKind::Production, ctx.version())?;
    Ok(ActionOutcome {
        artifact: Some(artifact),
        ..ActionOutcome::default()
    }
    .detail(format!(
        "{} {} wrote {}",
        ctx.config.task_runner,
        ctx.config.archive_task,
        file_name(&dest)
    )))
}

/// Archive the build directory directly.
pub fn direct_archive(env: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
    let ctx = env.ctx;
    let dest = ctx.artifact_path(ArtifactKind::Production);
    let summary = build_archive(&ctx.build_dir, &dest, &ctx.slug, &ExcludeSet::default())?;
    let artifact = describe_artifact(&dest, ArtifactKind::Production, ctx.version())?;
    Ok(ActionOutcome {
        artifact: Some(artifact),
        ..ActionOutcome::default()
    }
    .detail(format!(
        "wrote {} ({} files)",
        file_name(&dest),
        summary.files
    )))
}

// ---------------------------------------------------------------------------
// dev-package
// ---------------------------------------------------------------------------

/// Archive the project root minus development-only content.
pub fn dev_archive(env: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
    let ctx = env.ctx;
    let dest = ctx.artifact_path(ArtifactKind::Development);

    let mut excludes = ExcludeSet::new(&ctx.config.dev_exclude)?;
    let production = ctx.artifact_path(ArtifactKind::Production);
    for path in [&ctx.build_dir, &ctx.dist_dir, &production] {
        if let Some(relative) = tree::relative_to(path, &ctx.project_root) {
            excludes = excludes.with_path(&relative);
        }
    }

    let summary = build_archive(&ctx.project_root, &dest, &ctx.slug, &excludes)?;
    let artifact = describe_artifact(&dest, ArtifactKind::Development, ctx.version())?;
    Ok(ActionOutcome {
        artifact: Some(artifact),
        ..ActionOutcome::default()
    }
    .detail(format!(
        "wrote {} ({} files)",
        file_name(&dest),
        summary.files
    )))
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Built-in validation report, then the project's own validation script.
pub fn validate_output(env: &StepEnv<'_>) -> Result<ActionOutcome, StepFailure> {
    let ctx = env.ctx;
    let expectations = BuildExpectations::from_context(ctx);
    let report = validate_build(&ctx.build_dir, &expectations);

    let mut outcome = ActionOutcome::default().detail(format!(
        "{}: {} present, {} missing",
        report.status,
        report.present.len(),
        report.missing_count()
    ));
    for missing in &report.missing_required {
        outcome = outcome.detail(format!("missing required: {missing}"));
    }
    for missing in &report.missing_optional {
        outcome = outcome.detail(format!("missing optional: {missing}"));
    }

    if ctx.config.validation_script.as_os_str().is_empty() {
        outcome = outcome.detail("no external validation script configured");
    } else if let Some(script) = &ctx.tools.validation_script {
        let invocation = tool(env, Path::new(SCRIPT_SHELL))
            .arg(script)
            .arg(&ctx.build_dir);
        match run_tool(env, &invocation) {
            Ok(_) => outcome = outcome.detail("external validation script passed"),
            Err(err) => outcome
                .warnings
                .push(format!("external validation script failed: {err}")),
        }
    } else {
        outcome.warnings.push(format!(
            "validation script {} not found; external checks skipped",
            ctx.config.validation_script.display()
        ));
    }

    outcome.validation = Some(report);
    Ok(outcome)
}
