//! Step descriptors and the fixed pipeline definition.
//!
//! A step is a plain struct: its name, whether failure aborts the run, a
//! primary action and an optional fallback. The pipeline is the ordered list
//! returned by [`default_steps`]; nothing is looked up by string.

use std::fmt;

use serde::Serialize;

use plugpack_core::{Artifact, BuildContext};

use crate::error::StepFailure;
use crate::process::ProcessRunner;
use crate::steps;
use crate::validate::ValidationReport;

/// Identifies a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepName {
    Dependencies,
    Clean,
    Build,
    Reconcile,
    Translations,
    Package,
    DevPackage,
    Validate,
}

impl StepName {
    pub fn as_str(self) -> &'static str {
        match self {
            StepName::Dependencies => "dependencies",
            StepName::Clean => "clean",
            StepName::Build => "build",
            StepName::Reconcile => "reconcile",
            StepName::Translations => "translations",
            StepName::Package => "package",
            StepName::DevPackage => "dev-package",
            StepName::Validate => "validate",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an action may read: the immutable context and the process seam.
pub struct StepEnv<'a> {
    pub ctx: &'a BuildContext,
    pub runner: &'a dyn ProcessRunner,
}

/// What a successful action reports back.
///
/// Steps write only to their own filesystem locations; anything the report
/// needs (artifacts, validation results) travels back through this value.
#[derive(Debug, Clone, Default)]
pub struct ActionOutcome {
    pub details: Vec<String>,
    pub warnings: Vec<String>,
    pub artifact: Option<Artifact>,
    pub validation: Option<ValidationReport>,
}

impl ActionOutcome {
    pub fn detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }
}

/// A step action.
pub type StepAction = fn(&StepEnv<'_>) -> Result<ActionOutcome, StepFailure>;

/// One entry of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineStep {
    pub name: StepName,
    /// Failure (after any fallback) aborts the pipeline.
    pub required: bool,
    pub action: StepAction,
    pub fallback: Option<StepAction>,
}

impl PipelineStep {
    pub fn required(name: StepName, action: StepAction) -> Self {
        Self {
            name,
            required: true,
            action,
            fallback: None,
        }
    }

    pub fn optional(name: StepName, action: StepAction) -> Self {
        Self {
            name,
            required: false,
            action,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: StepAction) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

/// The packaging pipeline, in execution order.
pub fn default_steps() -> Vec<PipelineStep> {
    vec![
        PipelineStep::required(StepName::Dependencies, steps::install_dependencies),
        PipelineStep::required(StepName::Clean, steps::clean_workspace),
        PipelineStep::required(StepName::Build, steps::delegated_build)
            .with_fallback(steps::copy_source_tree),
        PipelineStep::required(StepName::Reconcile, steps::reconcile_auxiliary),
        PipelineStep::optional(StepName::Translations, steps::extract_translations),
        PipelineStep::required(StepName::Package, steps::delegated_archive)
            .with_fallback(steps::direct_archive),
        PipelineStep::required(StepName::DevPackage, steps::dev_archive),
        PipelineStep::optional(StepName::Validate, steps::validate_output),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_order_is_fixed() {
        let names: Vec<StepName> = default_steps().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                StepName::Dependencies,
                StepName::Clean,
                StepName::Build,
                StepName::Reconcile,
                StepName::Translations,
                StepName::Package,
                StepName::DevPackage,
                StepName::Validate,
            ]
        );
    }

    #[test]
    fn only_build_and_package_have_fallbacks() {
        for step in default_steps() {
            let expects_fallback = matches!(step.name, StepName::Build | StepName::Package);
            assert_eq!(step.fallback.is_some(), expects_fallback, "{}", step.name);
        }
    }

    #[test]
    fn translations_and_validation_are_best_effort() {
        for step in default_steps() {
            let optional = matches!(step.name, StepName::Translations | StepName::Validate);
            assert_eq!(step.required, !optional, "{}", step.name);
        }
    }
}
