//! # plugpack-pipeline
//!
//! Packaging pipeline: step actions, fallbacks, archiving and validation.
//!
//! Build a [`BuildContext`](plugpack_core::BuildContext), then call
//! [`run_pipeline`] with [`default_steps`] and a [`ProcessRunner`]
//! ([`SystemRunner`] outside tests). The returned [`PipelineReport`] holds
//! every step record, the produced artifacts and the validation result.

pub mod archive;
pub mod error;
pub mod executor;
pub mod process;
pub mod reconcile;
pub mod step;
pub mod steps;
pub mod tree;
pub mod validate;

pub use error::{PipelineError, ProcessError, StepFailure};
pub use executor::{
    run_pipeline, run_pipeline_with, OverallStatus, PipelineReport, StepOutcome, StepRecord,
};
pub use process::{resolve_run_as, Invocation, ProcessOutput, ProcessRunner, SystemRunner};
pub use step::{default_steps, PipelineStep, StepName};
pub use validate::{validate_build, BuildExpectations, ValidationReport, ValidationStatus};
