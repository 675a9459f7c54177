//! Build-output validation.
//!
//! Status rules:
//! - `Fail` if any required file or directory is missing
//! - `Warning` if only optional entries are missing
//! - `Pass` otherwise
//!
//! Validation is informational: it never modifies the build output.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use plugpack_core::BuildContext;

/// What a complete build output must contain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildExpectations {
    pub required_files: Vec<String>,
    pub required_dirs: Vec<String>,
    pub optional: Vec<String>,
}

impl BuildExpectations {
    /// Expectations from the run's config, with `{slug}` expanded.
    pub fn from_context(ctx: &BuildContext) -> Self {
        Self {
            required_files: ctx.expanded(&ctx.config.required_files),
            required_dirs: ctx.expanded(&ctx.config.required_dirs),
            optional: ctx.expanded(&ctx.config.optional_entries),
        }
    }

    pub fn required_count(&self) -> usize {
        self.required_files.len() + self.required_dirs.len()
    }
}

/// Overall verdict of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pass,
    Warning,
    Fail,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::Pass => write!(f, "PASS"),
            ValidationStatus::Warning => write!(f, "WARNING"),
            ValidationStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Presence counts over the expected build contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub present: Vec<String>,
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
    pub status: ValidationStatus,
}

impl ValidationReport {
    pub fn missing_count(&self) -> usize {
        self.missing_required.len() + self.missing_optional.len()
    }
}

/// Check `build_dir` against `expectations`.
///
/// A required file must be a regular file and a required directory a
/// directory; an entry of the wrong kind counts as missing.
pub fn validate_build(build_dir: &Path, expectations: &BuildExpectations) -> ValidationReport {
    let mut present = Vec::new();
    let mut missing_required = Vec::new();
    let mut missing_optional = Vec::new();

    for name in &expectations.required_files {
        if build_dir.join(name).is_file() {
            present.push(name.clone());
        } else {
            missing_required.push(name.clone());
        }
    }
    for name in &expectations.required_dirs {
        if build_dir.join(name).is_dir() {
            present.push(name.clone());
        } else {
            missing_required.push(name.clone());
        }
    }
    for name in &expectations.optional {
        if build_dir.join(name).exists() {
            present.push(name.clone());
        } else {
            missing_optional.push(name.clone());
        }
    }

    let status = if !missing_required.is_empty() {
        ValidationStatus::Fail
    } else if !missing_optional.is_empty() {
        ValidationStatus::Warning
    } else {
        ValidationStatus::Pass
    };

    ValidationReport {
        present,
        missing_required,
        missing_optional,
        status,
    }
}
